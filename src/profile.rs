//! Instrument constants and the cached display request.

use crate::id::DeviceId;
use crate::protocol::display;
use crate::protocol::dump::{self, DumpCatalog};

/// Waldorf manufacturer id.
pub const WALDORF: u8 = 0x3E;
/// Microwave II/XT equipment id.
pub const MICROWAVE_XT: u8 = 0x0E;
/// Display request command byte.
pub const CMD_DISPLAY_REQUEST: u8 = 0x05;

/// Everything the engine needs to know about one instrument model.
///
/// The display request embeds the device id, so it is cached and rebuilt on
/// every [`set_device_id`](Self::set_device_id); the fields are private to
/// keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    manufacturer_id: u8,
    equipment_id: u8,
    device_id: DeviceId,
    display_request_command: u8,
    display_dump_command: u8,
    display_columns: usize,
    display_rows: usize,
    catalog: DumpCatalog,
    display_request: [u8; 7],
}

impl DeviceProfile {
    pub fn new(
        manufacturer_id: u8,
        equipment_id: u8,
        device_id: DeviceId,
        display_request_command: u8,
        display_dump_command: u8,
        display_columns: usize,
        display_rows: usize,
        catalog: DumpCatalog,
    ) -> Self {
        Self {
            manufacturer_id,
            equipment_id,
            device_id,
            display_request_command,
            display_dump_command,
            display_columns,
            display_rows,
            catalog,
            display_request: display::build_request(
                manufacturer_id,
                equipment_id,
                device_id.as_byte(),
                display_request_command,
            ),
        }
    }

    /// Microwave II/XT: 2 x 40 character display, broadcast device id.
    pub fn microwave() -> Self {
        Self::new(
            WALDORF,
            MICROWAVE_XT,
            DeviceId::GLOBAL,
            CMD_DISPLAY_REQUEST,
            dump::CMD_DISPLAY,
            40,
            2,
            DumpCatalog::microwave(),
        )
    }

    pub fn manufacturer_id(&self) -> u8 {
        self.manufacturer_id
    }

    pub fn equipment_id(&self) -> u8 {
        self.equipment_id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Change the device id and rebuild the display request.
    pub fn set_device_id(&mut self, device_id: DeviceId) {
        self.device_id = device_id;
        self.display_request[3] = device_id.as_byte();
    }

    pub fn display_request_command(&self) -> u8 {
        self.display_request_command
    }

    pub fn display_dump_command(&self) -> u8 {
        self.display_dump_command
    }

    pub fn display_columns(&self) -> usize {
        self.display_columns
    }

    pub fn display_rows(&self) -> usize {
        self.display_rows
    }

    pub fn catalog(&self) -> &DumpCatalog {
        &self.catalog
    }

    /// The cached `F0 MAN EQUIP DEV CMD 00 F7` request.
    pub fn display_request(&self) -> &[u8; 7] {
        &self.display_request
    }

    /// Decode a display dump into this instrument's rows.
    pub fn decode_display(&self, msg: &[u8]) -> Vec<String> {
        display::decode_lines(msg, self.display_columns, self.display_rows)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::microwave()
    }
}
