// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Turns the raw TTY byte stream into key and mouse events. Handles the
// fixed xterm/VT100 set:
//
// - Control bytes (0x00-0x1F, 0x7F) as symbolic keys
// - CSI sequences (arrows, editing keys, F1-F12, xterm `1;m` modifiers)
// - SS3 sequences (application cursor keys and F1-F4)
// - Linux console F1-F5 (`ESC [ [ A` .. `ESC [ [ E`)
// - SGR, urxvt and X10 mouse reports
// - UTF-8 multi-byte characters
//
// # Design
//
// The decoder is an explicit byte-at-a-time state machine so partial
// sequences survive across reads. Feed bytes with [`Decoder::advance`];
// when no byte arrives within the escape timeout, call [`Decoder::flush`]
// to resolve a pending ESC.
//
// A bare ESC is ambiguous: the Escape key, the first byte of a sequence,
// or (in Alt mode) a Meta prefix. Unknown or overlong sequences fall back
// to resolving the ESC on its own and replaying the bytes after it.

use std::fmt;

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::terminal::Size;

/// Longest escape sequence (after ESC) the decoder will buffer.
pub const MAX_SEQUENCE_LEN: usize = 32;

// ─── Keys ───────────────────────────────────────────────────────────────────

/// A symbolic key code.
///
/// Values are stable integers: control keys are the byte they arrive as
/// (so several names alias one value, e.g. `TAB` and `CTRL_I`), and
/// navigation and function keys count down from `0xFFFF`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub u16);

#[allow(missing_docs)]
impl Key {
    pub const CTRL_TILDE: Self = Self(0x00);
    pub const CTRL_2: Self = Self(0x00);
    pub const CTRL_A: Self = Self(0x01);
    pub const CTRL_B: Self = Self(0x02);
    pub const CTRL_C: Self = Self(0x03);
    pub const CTRL_D: Self = Self(0x04);
    pub const CTRL_E: Self = Self(0x05);
    pub const CTRL_F: Self = Self(0x06);
    pub const CTRL_G: Self = Self(0x07);
    pub const BACKSPACE: Self = Self(0x08);
    pub const CTRL_H: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const CTRL_I: Self = Self(0x09);
    pub const CTRL_J: Self = Self(0x0A);
    pub const CTRL_K: Self = Self(0x0B);
    pub const CTRL_L: Self = Self(0x0C);
    pub const ENTER: Self = Self(0x0D);
    pub const CTRL_M: Self = Self(0x0D);
    pub const CTRL_N: Self = Self(0x0E);
    pub const CTRL_O: Self = Self(0x0F);
    pub const CTRL_P: Self = Self(0x10);
    pub const CTRL_Q: Self = Self(0x11);
    pub const CTRL_R: Self = Self(0x12);
    pub const CTRL_S: Self = Self(0x13);
    pub const CTRL_T: Self = Self(0x14);
    pub const CTRL_U: Self = Self(0x15);
    pub const CTRL_V: Self = Self(0x16);
    pub const CTRL_W: Self = Self(0x17);
    pub const CTRL_X: Self = Self(0x18);
    pub const CTRL_Y: Self = Self(0x19);
    pub const CTRL_Z: Self = Self(0x1A);
    pub const ESC: Self = Self(0x1B);
    pub const CTRL_LSQ_BRACKET: Self = Self(0x1B);
    pub const CTRL_3: Self = Self(0x1B);
    pub const CTRL_4: Self = Self(0x1C);
    pub const CTRL_BACKSLASH: Self = Self(0x1C);
    pub const CTRL_5: Self = Self(0x1D);
    pub const CTRL_RSQ_BRACKET: Self = Self(0x1D);
    pub const CTRL_6: Self = Self(0x1E);
    pub const CTRL_7: Self = Self(0x1F);
    pub const CTRL_SLASH: Self = Self(0x1F);
    pub const CTRL_UNDERSCORE: Self = Self(0x1F);
    pub const SPACE: Self = Self(0x20);
    pub const BACKSPACE2: Self = Self(0x7F);
    pub const CTRL_8: Self = Self(0x7F);

    pub const F1: Self = Self(0xFFFF);
    pub const F2: Self = Self(0xFFFE);
    pub const F3: Self = Self(0xFFFD);
    pub const F4: Self = Self(0xFFFC);
    pub const F5: Self = Self(0xFFFB);
    pub const F6: Self = Self(0xFFFA);
    pub const F7: Self = Self(0xFFF9);
    pub const F8: Self = Self(0xFFF8);
    pub const F9: Self = Self(0xFFF7);
    pub const F10: Self = Self(0xFFF6);
    pub const F11: Self = Self(0xFFF5);
    pub const F12: Self = Self(0xFFF4);
    pub const INSERT: Self = Self(0xFFF3);
    pub const DELETE: Self = Self(0xFFF2);
    pub const HOME: Self = Self(0xFFF1);
    pub const END: Self = Self(0xFFF0);
    pub const PGUP: Self = Self(0xFFEF);
    pub const PGDN: Self = Self(0xFFEE);
    pub const ARROW_UP: Self = Self(0xFFED);
    pub const ARROW_DOWN: Self = Self(0xFFEC);
    pub const ARROW_LEFT: Self = Self(0xFFEB);
    pub const ARROW_RIGHT: Self = Self(0xFFEA);
    pub const BACK_TAB: Self = Self(0xFFE9);
    pub const MOUSE_LEFT: Self = Self(0xFFE8);
    pub const MOUSE_RIGHT: Self = Self(0xFFE7);
    pub const MOUSE_MIDDLE: Self = Self(0xFFE6);
    pub const MOUSE_RELEASE: Self = Self(0xFFE5);
    pub const MOUSE_WHEEL_UP: Self = Self(0xFFE4);
    pub const MOUSE_WHEEL_DOWN: Self = Self(0xFFE3);

    /// Function key `F<n>` for `n` in 1..=12.
    #[must_use]
    pub const fn function(n: u8) -> Option<Self> {
        if matches!(n, 1..=12) {
            Some(Self(0xFFFF - (n as u16 - 1)))
        } else {
            None
        }
    }

    /// The key's integer value.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::CTRL_TILDE => "Ctrl+~",
            Self::BACKSPACE => "Backspace",
            Self::TAB => "Tab",
            Self::ENTER => "Enter",
            Self::ESC => "Esc",
            Self::CTRL_4 => "Ctrl+\\",
            Self::CTRL_5 => "Ctrl+]",
            Self::CTRL_6 => "Ctrl+6",
            Self::CTRL_7 => "Ctrl+/",
            Self::SPACE => "Space",
            Self::BACKSPACE2 => "Backspace2",
            Self::INSERT => "Insert",
            Self::DELETE => "Delete",
            Self::HOME => "Home",
            Self::END => "End",
            Self::PGUP => "PgUp",
            Self::PGDN => "PgDn",
            Self::ARROW_UP => "Up",
            Self::ARROW_DOWN => "Down",
            Self::ARROW_LEFT => "Left",
            Self::ARROW_RIGHT => "Right",
            Self::BACK_TAB => "BackTab",
            Self::MOUSE_LEFT => "MouseLeft",
            Self::MOUSE_RIGHT => "MouseRight",
            Self::MOUSE_MIDDLE => "MouseMiddle",
            Self::MOUSE_RELEASE => "MouseRelease",
            Self::MOUSE_WHEEL_UP => "WheelUp",
            Self::MOUSE_WHEEL_DOWN => "WheelDown",
            Self(c @ 0x01..=0x1A) => {
                #[allow(clippy::cast_possible_truncation)] // c <= 0x1A
                let letter = char::from(b'A' + c as u8 - 1);
                return write!(f, "Ctrl+{letter}");
            }
            Self(c @ 0xFFF4..=0xFFFF) => return write!(f, "F{}", 0xFFFF - c + 1),
            Self(c) => return write!(f, "Key({c:#06x})"),
        };
        f.write_str(name)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

bitflags! {
    /// Modifier flags attached to key and mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const ALT    = 1;
        const CTRL   = 2;
        const SHIFT  = 4;
        const MOTION = 8;
    }
}

bitflags! {
    /// How the decoder treats ESC, and whether mouse reports are wanted.
    ///
    /// `ESC` and `ALT` are exclusive; see [`InputMode::normalized`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputMode: u8 {
        /// A lone ESC is the Escape key.
        const ESC   = 1;
        /// ESC is a prefix setting Alt on the next key.
        const ALT   = 2;
        /// Report mouse events.
        const MOUSE = 4;
    }
}

impl InputMode {
    /// Apply the combination rules: neither ESC nor ALT selects ESC, and
    /// both together mean ESC.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut mode = self;
        if !mode.intersects(Self::ESC | Self::ALT) {
            mode |= Self::ESC;
        }
        if mode.contains(Self::ESC | Self::ALT) {
            mode.remove(Self::ALT);
        }
        mode
    }
}

impl Default for InputMode {
    fn default() -> Self {
        Self::ESC
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// Either a symbolic key or a Unicode character, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Key(Key),
    Char(char),
}

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub modifiers: Modifiers,
    pub code: KeyCode,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { modifiers, code }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Release,
    WheelUp,
    WheelDown,
}

impl MouseButton {
    /// The matching `Key::MOUSE_*` code.
    #[must_use]
    pub const fn key(self) -> Key {
        match self {
            Self::Left => Key::MOUSE_LEFT,
            Self::Right => Key::MOUSE_RIGHT,
            Self::Middle => Key::MOUSE_MIDDLE,
            Self::Release => Key::MOUSE_RELEASE,
            Self::WheelUp => Key::MOUSE_WHEEL_UP,
            Self::WheelDown => Key::MOUSE_WHEEL_DOWN,
        }
    }
}

/// A mouse report with 0-indexed cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    pub button: MouseButton,
    pub x: u16,
    pub y: u16,
    pub modifiers: Modifiers,
}

/// A decoded input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// The terminal changed size; buffers are already resized.
    Resize(Size),
}

/// Stable integer tag for an [`Event`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Key = 1,
    Resize = 2,
    Mouse = 3,
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Key(_) => EventKind::Key,
            Self::Resize(_) => EventKind::Resize,
            Self::Mouse(_) => EventKind::Mouse,
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Where the decoder is inside the byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecoderState {
    #[default]
    Idle,
    /// Saw ESC, nothing after it yet.
    InEscape,
    /// Bytes after ESC that may still form a known sequence.
    InEscapeSequence(Vec<u8>),
    /// Inside a multi-byte UTF-8 character of `len` bytes.
    InUtf8Continuation { len: u8, remaining: u8, codepoint: u32 },
}

/// Byte-stream to event decoder.
///
/// ```
/// use cellbox_term::input::{Decoder, Event, InputMode, Key, KeyCode};
///
/// let mut decoder = Decoder::new();
/// let events = decoder.advance(b"\x1b[A", InputMode::ESC);
/// let Event::Key(key) = events[0] else { panic!() };
/// assert_eq!(key.code, KeyCode::Key(Key::ARROW_UP));
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
    /// An ESC was consumed as a Meta prefix in Alt mode.
    alt_pending: bool,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Is a partial sequence waiting on more bytes or a timeout?
    #[inline]
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        !matches!(self.state, DecoderState::Idle)
    }

    /// Will the next key carry `Modifiers::ALT` from a consumed ESC?
    #[inline]
    #[must_use]
    pub const fn alt_pending(&self) -> bool {
        self.alt_pending
    }

    /// Decode `bytes`, returning every event they complete.
    ///
    /// Incomplete trailing bytes stay buffered for the next call.
    pub fn advance(&mut self, bytes: &[u8], mode: InputMode) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in bytes {
            self.feed(byte, mode, &mut events);
        }
        events
    }

    /// Resolve whatever is pending after the escape timeout expired.
    ///
    /// A lone ESC becomes the Escape key (or an Alt prefix in Alt mode);
    /// a partial sequence falls back and is replayed; a truncated UTF-8
    /// character is dropped.
    pub fn flush(&mut self, mode: InputMode) -> Vec<Event> {
        let mut events = Vec::new();
        match std::mem::take(&mut self.state) {
            DecoderState::Idle => {}
            DecoderState::InEscape => self.resolve_escape(mode, &mut events),
            DecoderState::InEscapeSequence(seq) => self.fallback(&seq, mode, &mut events),
            DecoderState::InUtf8Continuation { .. } => trace!("dropping truncated UTF-8"),
        }
        // Anything a replay left half-decoded is dropped with it.
        self.state = DecoderState::Idle;
        events
    }

    /// Drop all partial input and any pending Alt prefix.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.alt_pending = false;
    }

    fn feed(&mut self, byte: u8, mode: InputMode, out: &mut Vec<Event>) {
        match std::mem::take(&mut self.state) {
            DecoderState::Idle => self.feed_idle(byte, out),
            DecoderState::InEscape => match byte {
                b'[' | b'O' => self.state = DecoderState::InEscapeSequence(vec![byte]),
                _ => {
                    self.resolve_escape(mode, out);
                    self.feed_idle(byte, out);
                }
            },
            DecoderState::InEscapeSequence(mut seq) => {
                seq.push(byte);
                match classify(&seq) {
                    Sequence::Partial if seq.len() < MAX_SEQUENCE_LEN => {
                        self.state = DecoderState::InEscapeSequence(seq);
                    }
                    Sequence::Partial | Sequence::Unknown => self.fallback(&seq, mode, out),
                    Sequence::Key(key, modifiers) => self.push_key(KeyCode::Key(key), modifiers, out),
                    Sequence::Mouse(mouse) if mode.contains(InputMode::MOUSE) => {
                        // A report consumes a pending Meta prefix like a key does.
                        self.alt_pending = false;
                        out.push(Event::Mouse(mouse));
                    }
                    Sequence::Mouse(_) => trace!("mouse report while mouse mode is off"),
                    Sequence::Ignored => {}
                }
            }
            DecoderState::InUtf8Continuation {
                len,
                remaining,
                codepoint,
            } => {
                if byte & 0xC0 == 0x80 {
                    let codepoint = (codepoint << 6) | u32::from(byte & 0x3F);
                    if remaining > 1 {
                        self.state = DecoderState::InUtf8Continuation {
                            len,
                            remaining: remaining - 1,
                            codepoint,
                        };
                    } else {
                        // Surrogates and values past U+10FFFF fail `from_u32`;
                        // overlong forms encode shorter than they arrived.
                        match char::from_u32(codepoint) {
                            Some(ch) if ch.len_utf8() == usize::from(len) => {
                                self.push_key(KeyCode::Char(ch), Modifiers::empty(), out);
                            }
                            _ => trace!(codepoint, len, "dropping ill-formed UTF-8"),
                        }
                    }
                } else {
                    // Truncated character: drop it and start over.
                    trace!("dropping truncated UTF-8");
                    self.feed_idle(byte, out);
                }
            }
        }
    }

    fn feed_idle(&mut self, byte: u8, out: &mut Vec<Event>) {
        let utf8 = |remaining: u8, bits: u8| DecoderState::InUtf8Continuation {
            len: remaining + 1,
            remaining,
            codepoint: u32::from(bits),
        };
        match byte {
            0x1B => self.state = DecoderState::InEscape,
            0x00..=0x1F | 0x7F => {
                self.push_key(KeyCode::Key(Key(u16::from(byte))), Modifiers::empty(), out);
            }
            0x20..=0x7E => self.push_key(KeyCode::Char(char::from(byte)), Modifiers::empty(), out),
            0xC2..=0xDF => self.state = utf8(1, byte & 0x1F),
            0xE0..=0xEF => self.state = utf8(2, byte & 0x0F),
            0xF0..=0xF4 => self.state = utf8(3, byte & 0x07),
            _ => trace!(byte, "dropping invalid UTF-8 byte"),
        }
    }

    /// Settle an ESC that did not start a known sequence.
    fn resolve_escape(&mut self, mode: InputMode, out: &mut Vec<Event>) {
        if mode.contains(InputMode::ALT) && !self.alt_pending {
            self.alt_pending = true;
        } else {
            self.push_key(KeyCode::Key(Key::ESC), Modifiers::empty(), out);
        }
    }

    /// Resolve the leading ESC, then replay the bytes after it from Idle.
    fn fallback(&mut self, seq: &[u8], mode: InputMode, out: &mut Vec<Event>) {
        debug!(len = seq.len(), "unrecognized escape sequence");
        self.resolve_escape(mode, out);
        for &byte in seq {
            self.feed(byte, mode, out);
        }
    }

    fn push_key(&mut self, code: KeyCode, mut modifiers: Modifiers, out: &mut Vec<Event>) {
        if self.alt_pending {
            modifiers |= Modifiers::ALT;
            self.alt_pending = false;
        }
        out.push(Event::Key(KeyEvent::new(code, modifiers)));
    }
}

// ─── Sequence Matching ──────────────────────────────────────────────────────
//
// Pure functions over the bytes after ESC. Called after every byte, so a
// sequence is recognized as soon as its final byte arrives.

enum Sequence {
    /// Could still become a known sequence.
    Partial,
    Key(Key, Modifiers),
    Mouse(MouseEvent),
    /// Well-formed but carries nothing we report (horizontal wheel).
    Ignored,
    Unknown,
}

fn classify(seq: &[u8]) -> Sequence {
    match seq {
        [] | [b'[' | b'O'] | [b'[', b'['] => Sequence::Partial,
        [b'O', b] => ss3_key(*b).map_or(Sequence::Unknown, plain_key),
        [b'[', b'[', b] => linux_console_key(*b).map_or(Sequence::Unknown, plain_key),
        [b'[', b'M', rest @ ..] => x10_mouse(rest),
        [b'[', b'<', rest @ ..] => sgr_mouse(rest),
        [b'[', rest @ ..] => csi(rest),
        _ => Sequence::Unknown,
    }
}

const fn plain_key(key: Key) -> Sequence {
    Sequence::Key(key, Modifiers::empty())
}

const fn ss3_key(byte: u8) -> Option<Key> {
    Some(match byte {
        b'A' => Key::ARROW_UP,
        b'B' => Key::ARROW_DOWN,
        b'C' => Key::ARROW_RIGHT,
        b'D' => Key::ARROW_LEFT,
        b'H' => Key::HOME,
        b'F' => Key::END,
        b'P' => Key::F1,
        b'Q' => Key::F2,
        b'R' => Key::F3,
        b'S' => Key::F4,
        _ => return None,
    })
}

const fn linux_console_key(byte: u8) -> Option<Key> {
    Some(match byte {
        b'A' => Key::F1,
        b'B' => Key::F2,
        b'C' => Key::F3,
        b'D' => Key::F4,
        b'E' => Key::F5,
        _ => return None,
    })
}

/// Letter-terminated CSI keys: `ESC [ A`, `ESC [ 1 ; 5 A`.
const fn csi_letter_key(byte: u8) -> Option<Key> {
    match byte {
        b'Z' => Some(Key::BACK_TAB),
        _ => ss3_key(byte),
    }
}

/// Tilde-terminated CSI keys: `ESC [ 3 ~`, `ESC [ 15 ; 2 ~`.
const fn tilde_key(code: u16) -> Option<Key> {
    Some(match code {
        1 | 7 => Key::HOME,
        2 => Key::INSERT,
        3 => Key::DELETE,
        4 | 8 => Key::END,
        5 => Key::PGUP,
        6 => Key::PGDN,
        11 => Key::F1,
        12 => Key::F2,
        13 => Key::F3,
        14 => Key::F4,
        15 => Key::F5,
        17 => Key::F6,
        18 => Key::F7,
        19 => Key::F8,
        20 => Key::F9,
        21 => Key::F10,
        23 => Key::F11,
        24 => Key::F12,
        _ => return None,
    })
}

const fn is_param_byte(b: u8) -> bool {
    b.is_ascii_digit() || b == b';'
}

/// Generic CSI: parameter bytes, then one final byte.
fn csi(rest: &[u8]) -> Sequence {
    let Some((&last, params)) = rest.split_last() else {
        return Sequence::Partial;
    };
    if !params.iter().all(|b| (0x20..=0x3F).contains(b)) {
        return Sequence::Unknown;
    }
    if (0x20..=0x3F).contains(&last) {
        return Sequence::Partial;
    }
    if !(0x40..=0x7E).contains(&last) || !params.iter().copied().all(is_param_byte) {
        return Sequence::Unknown;
    }

    let params = parse_params(params);
    let modifiers = params.get(1).map_or(Modifiers::empty(), |&m| decode_modifiers(m));

    let key = match last {
        b'~' => params.first().and_then(|&code| tilde_key(code)),
        b'M' if params.len() == 3 => {
            // urxvt: ESC [ b ; x ; y M, button offset by 32.
            return mouse(params[0].saturating_sub(32), params[1], params[2], false);
        }
        _ => csi_letter_key(last),
    };
    key.map_or(Sequence::Unknown, |key| Sequence::Key(key, modifiers))
}

/// X10: `ESC [ M b x y`, each byte offset by 32.
fn x10_mouse(rest: &[u8]) -> Sequence {
    match rest {
        [b, x, y] => mouse(
            u16::from(b.saturating_sub(32)),
            u16::from(x.saturating_sub(32)),
            u16::from(y.saturating_sub(32)),
            false,
        ),
        _ if rest.len() < 3 => Sequence::Partial,
        _ => Sequence::Unknown,
    }
}

/// SGR: `ESC [ < b ; x ; y M` (press/motion) or `... m` (release).
fn sgr_mouse(rest: &[u8]) -> Sequence {
    let Some((&last, body)) = rest.split_last() else {
        return Sequence::Partial;
    };
    if !body.iter().copied().all(is_param_byte) {
        return Sequence::Unknown;
    }
    match last {
        b'M' | b'm' => match parse_params(body)[..] {
            [b, x, y] => mouse(b, x, y, last == b'm'),
            _ => Sequence::Unknown,
        },
        b if is_param_byte(b) => Sequence::Partial,
        _ => Sequence::Unknown,
    }
}

/// Decode an xterm button byte and 1-based coordinates.
///
/// Bits 0-1 select the button (3 = release), bit 2 Shift, bit 3 Alt,
/// bit 4 Ctrl, bit 5 motion, bit 6 wheel.
fn mouse(code: u16, x: u16, y: u16, release: bool) -> Sequence {
    let button = if code & 64 != 0 {
        match code & 3 {
            0 => MouseButton::WheelUp,
            1 => MouseButton::WheelDown,
            _ => return Sequence::Ignored,
        }
    } else if release {
        MouseButton::Release
    } else {
        match code & 3 {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Release,
        }
    };

    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::SHIFT, code & 4 != 0);
    modifiers.set(Modifiers::ALT, code & 8 != 0);
    modifiers.set(Modifiers::CTRL, code & 16 != 0);
    modifiers.set(Modifiers::MOTION, code & 32 != 0);

    Sequence::Mouse(MouseEvent {
        button,
        x: x.saturating_sub(1),
        y: y.saturating_sub(1),
        modifiers,
    })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Parse `;`-separated decimal parameters. Empty fields are 0.
fn parse_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            field.iter().fold(0u16, |acc, &d| {
                acc.saturating_mul(10).saturating_add(u16::from(d - b'0'))
            })
        })
        .collect()
}

/// xterm modifier parameter: `1 + bitmask` with 1 Shift, 2 Alt, 4 Ctrl.
fn decode_modifiers(param: u16) -> Modifiers {
    let mask = param.saturating_sub(1);
    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::SHIFT, mask & 1 != 0);
    modifiers.set(Modifiers::ALT, mask & 2 != 0);
    modifiers.set(Modifiers::CTRL, mask & 4 != 0);
    modifiers
}

// ─── Tests ──────────────────────────────────────────────────────────────────
