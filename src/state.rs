//! Shared engine state.
//!
//! Written by the polling thread and by the transport's input callback at
//! the same time. Scalars are atomics; each buffer sits behind its own mutex
//! and is only ever replaced whole through [`EngineState::replace_plain`] /
//! [`EngineState::replace_display`], so readers see either the old or the new
//! message, never a mix.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

/// What the mirror shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Mode {
    /// Show each new non-display message as it arrives.
    Direct = 0,
    /// Request the display once after the device sent something new.
    DisplayOnDemand = 1,
    /// Request the display every polling interval.
    ContinuousDisplay = 2,
}

impl Mode {
    fn from_u8(b: u8) -> Self {
        match b {
            1 => Mode::DisplayOnDemand,
            2 => Mode::ContinuousDisplay,
            _ => Mode::Direct,
        }
    }
}

/// The display dump and its decoded rows, replaced together.
#[derive(Debug, Default)]
struct DisplayBuffer {
    raw: Vec<u8>,
    lines: Vec<String>,
}

/// State shared by the polling and receiving sides of a session.
#[derive(Debug)]
pub struct EngineState {
    mode: AtomicU8,
    paused: AtomicBool,
    quit: AtomicBool,
    new_data: AtomicBool,
    unanswered: AtomicU32,
    error: Mutex<Option<String>>,
    last_plain: Mutex<Vec<u8>>,
    display: Mutex<DisplayBuffer>,
}

impl EngineState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: AtomicU8::new(mode as u8),
            paused: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            new_data: AtomicBool::new(false),
            unanswered: AtomicU32::new(0),
            error: Mutex::new(None),
            last_plain: Mutex::new(Vec::with_capacity(16)),
            display: Mutex::new(DisplayBuffer::default()),
        }
    }

    // -- Scalars --

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Set the pause flag. A real transition also resets the unanswered
    /// counter; returns whether the flag changed.
    pub fn set_paused(&self, paused: bool) -> bool {
        let changed = self.paused.swap(paused, Ordering::AcqRel) != paused;
        if changed {
            self.unanswered.store(0, Ordering::Release);
        }
        changed
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
    }

    pub fn new_data(&self) -> bool {
        self.new_data.load(Ordering::Acquire)
    }

    pub fn set_new_data(&self, new_data: bool) {
        self.new_data.store(new_data, Ordering::Release);
    }

    pub fn unanswered(&self) -> u32 {
        self.unanswered.load(Ordering::Acquire)
    }

    /// Count one more unanswered request; returns the new count.
    pub fn count_unanswered(&self) -> u32 {
        self.unanswered.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Take back one count after a request that never went out. Never goes
    /// below zero.
    pub fn uncount_unanswered(&self) {
        let _ = self
            .unanswered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn reset_unanswered(&self) {
        self.unanswered.store(0, Ordering::Release);
    }

    // -- Error --

    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    /// Record a fatal error and request quit. The first error wins.
    pub fn fail(&self, msg: impl Into<String>) {
        let mut error = lock(&self.error);
        if error.is_none() {
            *error = Some(msg.into());
        }
        drop(error);
        self.request_quit();
    }

    pub fn clear_error(&self) {
        *lock(&self.error) = None;
    }

    // -- Buffers --

    /// Copy of the last non-display message.
    pub fn last_plain(&self) -> Vec<u8> {
        lock(&self.last_plain).clone()
    }

    /// Replace the last non-display message if `msg` differs from it.
    /// Returns whether it was replaced.
    pub fn replace_plain(&self, msg: &[u8]) -> bool {
        let mut last = lock(&self.last_plain);
        if same_message(&last, msg) {
            return false;
        }
        last.clear();
        last.extend_from_slice(msg);
        true
    }

    /// Copy of the last display dump.
    pub fn last_display(&self) -> Vec<u8> {
        lock(&self.display).raw.clone()
    }

    /// Copy of the decoded display rows.
    pub fn decoded_lines(&self) -> Vec<String> {
        lock(&self.display).lines.clone()
    }

    /// Replace the last display dump if `msg` differs from it, decoding the
    /// new rows with `decode` inside the same critical section. Returns
    /// whether it was replaced.
    pub fn replace_display(&self, msg: &[u8], decode: impl FnOnce(&[u8]) -> Vec<String>) -> bool {
        let mut display = lock(&self.display);
        if same_message(&display.raw, msg) {
            return false;
        }
        display.raw.clear();
        display.raw.extend_from_slice(msg);
        display.lines = decode(msg);
        true
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(Mode::Direct)
    }
}

/// Deduplication equality: equal iff same length and identical bytes. A
/// length mismatch is "different" without looking at content.
pub fn same_message(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).all(|(x, y)| x == y)
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trip() {
        let state = EngineState::default();
        assert_eq!(state.mode(), Mode::Direct);
        for mode in [Mode::DisplayOnDemand, Mode::ContinuousDisplay, Mode::Direct] {
            state.set_mode(mode);
            assert_eq!(state.mode(), mode);
        }
    }

    #[test]
    fn pause_transition_resets_counter() {
        let state = EngineState::default();
        state.count_unanswered();
        state.count_unanswered();
        assert!(!state.set_paused(false));
        assert_eq!(state.unanswered(), 2);
        assert!(state.set_paused(true));
        assert_eq!(state.unanswered(), 0);
        state.count_unanswered();
        assert!(state.set_paused(false));
        assert_eq!(state.unanswered(), 0);
    }

    #[test]
    fn uncount_stops_at_zero() {
        let state = EngineState::default();
        assert_eq!(state.count_unanswered(), 1);
        state.uncount_unanswered();
        assert_eq!(state.unanswered(), 0);
        state.uncount_unanswered();
        assert_eq!(state.unanswered(), 0);
    }

    #[test]
    fn first_error_wins() {
        let state = EngineState::default();
        state.fail("first");
        state.fail("second");
        assert_eq!(state.error().as_deref(), Some("first"));
        assert!(state.quit_requested());
    }

    #[test]
    fn replace_plain_dedups() {
        let state = EngineState::default();
        assert!(state.replace_plain(&[0xB0, 0x07, 0x64]));
        assert!(!state.replace_plain(&[0xB0, 0x07, 0x64]));
        assert!(state.replace_plain(&[0xB0, 0x07, 0x65]));
        assert_eq!(state.last_plain(), vec![0xB0, 0x07, 0x65]);
    }

    #[test]
    fn empty_buffer_differs_from_empty_prefix() {
        let state = EngineState::default();
        assert!(!state.replace_plain(&[]));
        assert!(state.replace_plain(&[0xC0]));
    }

    #[test]
    fn replace_display_decodes_once() {
        let state = EngineState::default();
        let mut calls = 0;
        assert!(state.replace_display(&[1, 2, 3], |_| {
            calls += 1;
            vec!["row".into()]
        }));
        assert!(!state.replace_display(&[1, 2, 3], |_| {
            calls += 1;
            vec![]
        }));
        assert_eq!(calls, 1);
        assert_eq!(state.decoded_lines(), vec!["row".to_string()]);
        assert_eq!(state.last_display(), vec![1, 2, 3]);
    }

    mod proptests {
        use super::super::same_message;
        use proptest::prelude::*;

        proptest! {
            /// Identical sequences are the same message.
            #[test]
            fn prop_identical_is_same(bytes in prop::collection::vec(any::<u8>(), 0..300)) {
                prop_assert!(same_message(&bytes, &bytes.clone()));
            }

            /// Flipping any byte makes an equal-length sequence different.
            #[test]
            fn prop_one_byte_differs(
                bytes in prop::collection::vec(any::<u8>(), 1..300),
                index in any::<prop::sample::Index>(),
                flip in 1u8..=255,
            ) {
                let mut other = bytes.clone();
                let i = index.index(other.len());
                other[i] ^= flip;
                prop_assert!(!same_message(&bytes, &other));
            }

            /// Different lengths are always different, whatever the content.
            #[test]
            fn prop_length_mismatch_differs(
                bytes in prop::collection::vec(any::<u8>(), 0..300),
                extra in prop::collection::vec(any::<u8>(), 1..8),
            ) {
                let mut longer = bytes.clone();
                longer.extend_from_slice(&extra);
                prop_assert!(!same_message(&bytes, &longer));
                prop_assert!(!same_message(&longer, &bytes));
            }
        }
    }
}
