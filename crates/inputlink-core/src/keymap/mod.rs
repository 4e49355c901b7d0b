//! The fixed set of keys InputLink tracks.
//!
//! Numeric values follow the GLFW key token table, which is what the host
//! input layer reports and what receivers expect in the `<keycode>` field of a
//! `KEY` line.  Names follow the host's translation-key scheme
//! (`key.keyboard.<name>`).
//!
//! # Why a closed set?
//!
//! Polling a key code the input backend does not know about is an error on
//! some platforms.  Only variants of [`KeyCode`] are ever polled, and
//! [`KeyCode::TRACKED`] is the single list that drives every sampling pass, so
//! an unknown code can never reach the backend.

/// A trackable keyboard key.
///
/// The discriminant of each variant is its GLFW key token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum KeyCode {
    // Modifiers (GLFW 340–347)
    LeftShift = 340,
    LeftControl = 341,
    LeftAlt = 342,
    LeftSuper = 343,
    RightShift = 344,
    RightControl = 345,
    RightAlt = 346,
    RightSuper = 347,

    // Function keys (GLFW 290–301)
    F1 = 290,
    F2 = 291,
    F3 = 292,
    F4 = 293,
    F5 = 294,
    F6 = 295,
    F7 = 296,
    F8 = 297,
    F9 = 298,
    F10 = 299,
    F11 = 300,
    F12 = 301,

    // Digits (GLFW 48–57)
    Digit0 = 48,
    Digit1 = 49,
    Digit2 = 50,
    Digit3 = 51,
    Digit4 = 52,
    Digit5 = 53,
    Digit6 = 54,
    Digit7 = 55,
    Digit8 = 56,
    Digit9 = 57,

    // Letters (GLFW 65–90)
    A = 65,
    B = 66,
    C = 67,
    D = 68,
    E = 69,
    F = 70,
    G = 71,
    H = 72,
    I = 73,
    J = 74,
    K = 75,
    L = 76,
    M = 77,
    N = 78,
    O = 79,
    P = 80,
    Q = 81,
    R = 82,
    S = 83,
    T = 84,
    U = 85,
    V = 86,
    W = 87,
    X = 88,
    Y = 89,
    Z = 90,

    // Editing and navigation
    Space = 32,
    Escape = 256,
    Enter = 257,
    Tab = 258,
    Backspace = 259,
    Insert = 260,
    Delete = 261,
    Right = 262,
    Left = 263,
    Down = 264,
    Up = 265,
    PageUp = 266,
    PageDown = 267,
    Home = 268,
    End = 269,
    CapsLock = 280,
    ScrollLock = 281,
    NumLock = 282,
    PrintScreen = 283,
    Pause = 284,

    // Punctuation
    GraveAccent = 96,
    Minus = 45,
    Equal = 61,
    LeftBracket = 91,
    RightBracket = 93,
    Backslash = 92,
    Semicolon = 59,
    Apostrophe = 39,
    Comma = 44,
    Period = 46,
    Slash = 47,
}

impl KeyCode {
    /// Every tracked key in poll order.
    ///
    /// Modifiers come first so that, within one sampling pass, a modifier held
    /// together with another key is discovered before that key.
    #[rustfmt::skip]
    pub const TRACKED: [KeyCode; 87] = {
        use KeyCode::*;
        [
            LeftShift, LeftControl, LeftAlt, LeftSuper,
            RightShift, RightControl, RightAlt, RightSuper,
            F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
            Digit0, Digit1, Digit2, Digit3, Digit4,
            Digit5, Digit6, Digit7, Digit8, Digit9,
            A, B, C, D, E, F, G, H, I, J, K, L, M,
            N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
            Space, Escape, Enter, Tab, Backspace, Insert, Delete,
            Right, Left, Down, Up, PageUp, PageDown, Home, End,
            CapsLock, ScrollLock, NumLock, PrintScreen, Pause,
            GraveAccent, Minus, Equal, LeftBracket, RightBracket,
            Backslash, Semicolon, Apostrophe, Comma, Period, Slash,
        ]
    };

    /// Returns the numeric key token sent on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up a tracked key by its numeric token.
    ///
    /// Returns `None` for any code outside the tracked set.
    pub fn from_code(code: i32) -> Option<KeyCode> {
        Self::TRACKED.iter().copied().find(|k| k.code() == code)
    }

    /// Returns `true` for Shift, Control, Alt and Super on either side.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::LeftShift
                | KeyCode::LeftControl
                | KeyCode::LeftAlt
                | KeyCode::LeftSuper
                | KeyCode::RightShift
                | KeyCode::RightControl
                | KeyCode::RightAlt
                | KeyCode::RightSuper
        )
    }

    /// Returns the host translation key, e.g. `key.keyboard.left.shift`.
    pub fn name(self) -> &'static str {
        use KeyCode::*;
        match self {
            LeftShift => "key.keyboard.left.shift",
            LeftControl => "key.keyboard.left.control",
            LeftAlt => "key.keyboard.left.alt",
            LeftSuper => "key.keyboard.left.win",
            RightShift => "key.keyboard.right.shift",
            RightControl => "key.keyboard.right.control",
            RightAlt => "key.keyboard.right.alt",
            RightSuper => "key.keyboard.right.win",
            F1 => "key.keyboard.f1",
            F2 => "key.keyboard.f2",
            F3 => "key.keyboard.f3",
            F4 => "key.keyboard.f4",
            F5 => "key.keyboard.f5",
            F6 => "key.keyboard.f6",
            F7 => "key.keyboard.f7",
            F8 => "key.keyboard.f8",
            F9 => "key.keyboard.f9",
            F10 => "key.keyboard.f10",
            F11 => "key.keyboard.f11",
            F12 => "key.keyboard.f12",
            Digit0 => "key.keyboard.0",
            Digit1 => "key.keyboard.1",
            Digit2 => "key.keyboard.2",
            Digit3 => "key.keyboard.3",
            Digit4 => "key.keyboard.4",
            Digit5 => "key.keyboard.5",
            Digit6 => "key.keyboard.6",
            Digit7 => "key.keyboard.7",
            Digit8 => "key.keyboard.8",
            Digit9 => "key.keyboard.9",
            A => "key.keyboard.a",
            B => "key.keyboard.b",
            C => "key.keyboard.c",
            D => "key.keyboard.d",
            E => "key.keyboard.e",
            F => "key.keyboard.f",
            G => "key.keyboard.g",
            H => "key.keyboard.h",
            I => "key.keyboard.i",
            J => "key.keyboard.j",
            K => "key.keyboard.k",
            L => "key.keyboard.l",
            M => "key.keyboard.m",
            N => "key.keyboard.n",
            O => "key.keyboard.o",
            P => "key.keyboard.p",
            Q => "key.keyboard.q",
            R => "key.keyboard.r",
            S => "key.keyboard.s",
            T => "key.keyboard.t",
            U => "key.keyboard.u",
            V => "key.keyboard.v",
            W => "key.keyboard.w",
            X => "key.keyboard.x",
            Y => "key.keyboard.y",
            Z => "key.keyboard.z",
            Space => "key.keyboard.space",
            Escape => "key.keyboard.escape",
            Enter => "key.keyboard.enter",
            Tab => "key.keyboard.tab",
            Backspace => "key.keyboard.backspace",
            Insert => "key.keyboard.insert",
            Delete => "key.keyboard.delete",
            Right => "key.keyboard.right",
            Left => "key.keyboard.left",
            Down => "key.keyboard.down",
            Up => "key.keyboard.up",
            PageUp => "key.keyboard.page.up",
            PageDown => "key.keyboard.page.down",
            Home => "key.keyboard.home",
            End => "key.keyboard.end",
            CapsLock => "key.keyboard.caps.lock",
            ScrollLock => "key.keyboard.scroll.lock",
            NumLock => "key.keyboard.num.lock",
            PrintScreen => "key.keyboard.print.screen",
            Pause => "key.keyboard.pause",
            GraveAccent => "key.keyboard.grave.accent",
            Minus => "key.keyboard.minus",
            Equal => "key.keyboard.equal",
            LeftBracket => "key.keyboard.left.bracket",
            RightBracket => "key.keyboard.right.bracket",
            Backslash => "key.keyboard.backslash",
            Semicolon => "key.keyboard.semicolon",
            Apostrophe => "key.keyboard.apostrophe",
            Comma => "key.keyboard.comma",
            Period => "key.keyboard.period",
            Slash => "key.keyboard.slash",
        }
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
