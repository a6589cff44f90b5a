//! Code tables of T.4 / T.6 and the constant state machines built from them.
//!
//! Run lengths are decoded one bit at a time through a binary tree laid out in
//! a const array. Each node holds the transition for a 0 and for a 1 bit:
//! either the index of the next node, a decoded run length tagged with
//! [`VALUE_FLAG`], or [`INVALID`].

/// One entry of a run length code table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RunCode {
    pub(crate) run: u16,
    pub(crate) bits: u8,
    pub(crate) code: u16,
}

impl RunCode {
    const fn new(run: u16, bits: u8, code: u16) -> RunCode {
        RunCode { run, bits, code }
    }
}

pub(crate) const VALUE_FLAG: u16 = 0x8000;
pub(crate) const VALUE_MASK: u16 = 0x1FFF;
pub(crate) const INVALID: u16 = 0xFFFF;

/// Longest codeword of any run table.
pub(crate) const MAX_CODE_BITS: u8 = 13;

/// Runs of at least this many pixels need more than one makeup code.
pub(crate) const REPEAT_MAKEUP_FROM: u32 = 2624;
pub(crate) const LONGEST_MAKEUP: u32 = 2560;

/// The 12 bit end of line code.
pub(crate) const EOL_CODE: u32 = 0x001;
pub(crate) const EOL_BITS: u32 = 12;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Node {
    pub(crate) on_0: u16,
    pub(crate) on_1: u16,
}

impl Node {
    const EMPTY: Node = Node {
        on_0: INVALID,
        on_1: INVALID,
    };
}

const fn insert(nodes: &mut [Node], mut len: usize, entry: RunCode) -> usize {
    let mut node = 0usize;
    let mut i = 0u8;
    while i < entry.bits {
        let bit = (entry.code >> (entry.bits - 1 - i)) & 1;
        let next = if bit == 0 { nodes[node].on_0 } else { nodes[node].on_1 };
        if i == entry.bits - 1 {
            let leaf = VALUE_FLAG | (entry.run & VALUE_MASK);
            if bit == 0 {
                nodes[node].on_0 = leaf;
            } else {
                nodes[node].on_1 = leaf;
            }
        } else if next == INVALID || next & VALUE_FLAG != 0 {
            if bit == 0 {
                nodes[node].on_0 = len as u16;
            } else {
                nodes[node].on_1 = len as u16;
            }
            node = len;
            len += 1;
        } else {
            node = next as usize;
        }
        i += 1;
    }
    len
}

const fn insert_all(nodes: &mut [Node], mut len: usize, table: &[RunCode]) -> usize {
    let mut i = 0;
    while i < table.len() {
        len = insert(nodes, len, table[i]);
        i += 1;
    }
    len
}

const fn build_run_tree(terminating: &[RunCode], makeup: &[RunCode]) -> [Node; RUN_NODES] {
    let mut nodes = [Node::EMPTY; RUN_NODES];
    let mut len = 1;
    len = insert_all(&mut nodes, len, terminating);
    len = insert_all(&mut nodes, len, makeup);
    let _ = insert_all(&mut nodes, len, &COMMON_MAKEUP);
    nodes
}

const RUN_NODES: usize = 104;

pub(crate) const WHITE_TREE: [Node; RUN_NODES] = build_run_tree(&WHITE_TERMINATING, &WHITE_MAKEUP);
pub(crate) const BLACK_TREE: [Node; RUN_NODES] = build_run_tree(&BLACK_TERMINATING, &BLACK_MAKEUP);

/// The code for a makeup run, a multiple of 64 up to 2560.
pub(crate) fn makeup_code(white: bool, run: u32) -> RunCode {
    if run >= 1792 {
        COMMON_MAKEUP[((run - 1792) / 64) as usize]
    } else if white {
        WHITE_MAKEUP[(run / 64 - 1) as usize]
    } else {
        BLACK_MAKEUP[(run / 64 - 1) as usize]
    }
}

/// The code for a terminating run below 64.
pub(crate) fn terminating_code(white: bool, run: u32) -> RunCode {
    if white {
        WHITE_TERMINATING[run as usize]
    } else {
        BLACK_TERMINATING[run as usize]
    }
}

/// Result of decoding a 2-D mode code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Pass,
    Horizontal,
    /// `a1 - b1`, within -3..=3.
    Vertical(i8),
    /// Seven zero bits, the start of an end of line code.
    Eol,
    Uncompressed,
    Error,
}

impl Mode {
    /// The codeword of a mode the encoder writes, as `(code, bits)`.
    pub(crate) fn code(self) -> (u32, u32) {
        match self {
            Mode::Pass => (0b0001, 4),
            Mode::Horizontal => (0b001, 3),
            Mode::Vertical(0) => (0b1, 1),
            Mode::Vertical(1) => (0b011, 3),
            Mode::Vertical(-1) => (0b010, 3),
            Mode::Vertical(2) => (0b000011, 6),
            Mode::Vertical(-2) => (0b000010, 6),
            Mode::Vertical(3) => (0b0000011, 7),
            Mode::Vertical(-3) => (0b0000010, 7),
            Mode::Uncompressed => (0b0000001111, 10),
            Mode::Vertical(_) | Mode::Eol | Mode::Error => (0, 0),
        }
    }
}

/// States of the mode decoder, each consuming one bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ModeState {
    Start,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ModeStep {
    Next(ModeState),
    Finish(Mode),
}

use self::ModeState as S;
use self::ModeStep::{Finish, Next};

/// Transitions indexed by state, then by the bit read.
pub(crate) const MODE_TABLE: [[ModeStep; 2]; 13] = [
    // Start
    [Next(S::A), Finish(Mode::Vertical(0))],
    // A: 0
    [Next(S::B), Next(S::C)],
    // B: 00
    [Next(S::D), Finish(Mode::Horizontal)],
    // C: 01
    [Finish(Mode::Vertical(-1)), Finish(Mode::Vertical(1))],
    // D: 000
    [Next(S::E), Finish(Mode::Pass)],
    // E: 0000
    [Next(S::F), Next(S::G)],
    // F: 00000
    [Next(S::H), Next(S::I)],
    // G: 00001
    [Finish(Mode::Vertical(-2)), Finish(Mode::Vertical(2))],
    // H: 000000
    [Finish(Mode::Eol), Next(S::J)],
    // I: 000001
    [Finish(Mode::Vertical(-3)), Finish(Mode::Vertical(3))],
    // J: 0000001
    [Finish(Mode::Error), Next(S::K)],
    // K: 00000011
    [Finish(Mode::Error), Next(S::L)],
    // L: 000000111
    [Finish(Mode::Error), Finish(Mode::Uncompressed)],
];

impl ModeState {
    #[inline(always)]
    pub(crate) fn step(self, bit: u32) -> ModeStep {
        MODE_TABLE[self as usize][(bit & 1) as usize]
    }
}

/// White terminating codes, runs 0 to 63.
pub(crate) const WHITE_TERMINATING: [RunCode; 64] = [
    RunCode::new(0, 8, 0b00110101),
    RunCode::new(1, 6, 0b000111),
    RunCode::new(2, 4, 0b0111),
    RunCode::new(3, 4, 0b1000),
    RunCode::new(4, 4, 0b1011),
    RunCode::new(5, 4, 0b1100),
    RunCode::new(6, 4, 0b1110),
    RunCode::new(7, 4, 0b1111),
    RunCode::new(8, 5, 0b10011),
    RunCode::new(9, 5, 0b10100),
    RunCode::new(10, 5, 0b00111),
    RunCode::new(11, 5, 0b01000),
    RunCode::new(12, 6, 0b001000),
    RunCode::new(13, 6, 0b000011),
    RunCode::new(14, 6, 0b110100),
    RunCode::new(15, 6, 0b110101),
    RunCode::new(16, 6, 0b101010),
    RunCode::new(17, 6, 0b101011),
    RunCode::new(18, 7, 0b0100111),
    RunCode::new(19, 7, 0b0001100),
    RunCode::new(20, 7, 0b0001000),
    RunCode::new(21, 7, 0b0010111),
    RunCode::new(22, 7, 0b0000011),
    RunCode::new(23, 7, 0b0000100),
    RunCode::new(24, 7, 0b0101000),
    RunCode::new(25, 7, 0b0101011),
    RunCode::new(26, 7, 0b0010011),
    RunCode::new(27, 7, 0b0100100),
    RunCode::new(28, 7, 0b0011000),
    RunCode::new(29, 8, 0b00000010),
    RunCode::new(30, 8, 0b00000011),
    RunCode::new(31, 8, 0b00011010),
    RunCode::new(32, 8, 0b00011011),
    RunCode::new(33, 8, 0b00010010),
    RunCode::new(34, 8, 0b00010011),
    RunCode::new(35, 8, 0b00010100),
    RunCode::new(36, 8, 0b00010101),
    RunCode::new(37, 8, 0b00010110),
    RunCode::new(38, 8, 0b00010111),
    RunCode::new(39, 8, 0b00101000),
    RunCode::new(40, 8, 0b00101001),
    RunCode::new(41, 8, 0b00101010),
    RunCode::new(42, 8, 0b00101011),
    RunCode::new(43, 8, 0b00101100),
    RunCode::new(44, 8, 0b00101101),
    RunCode::new(45, 8, 0b00000100),
    RunCode::new(46, 8, 0b00000101),
    RunCode::new(47, 8, 0b00001010),
    RunCode::new(48, 8, 0b00001011),
    RunCode::new(49, 8, 0b01010010),
    RunCode::new(50, 8, 0b01010011),
    RunCode::new(51, 8, 0b01010100),
    RunCode::new(52, 8, 0b01010101),
    RunCode::new(53, 8, 0b00100100),
    RunCode::new(54, 8, 0b00100101),
    RunCode::new(55, 8, 0b01011000),
    RunCode::new(56, 8, 0b01011001),
    RunCode::new(57, 8, 0b01011010),
    RunCode::new(58, 8, 0b01011011),
    RunCode::new(59, 8, 0b01001010),
    RunCode::new(60, 8, 0b01001011),
    RunCode::new(61, 8, 0b00110010),
    RunCode::new(62, 8, 0b00110011),
    RunCode::new(63, 8, 0b00110100),
];

/// White makeup codes, runs 64 to 1728.
pub(crate) const WHITE_MAKEUP: [RunCode; 27] = [
    RunCode::new(64, 5, 0b11011),
    RunCode::new(128, 5, 0b10010),
    RunCode::new(192, 6, 0b010111),
    RunCode::new(256, 7, 0b0110111),
    RunCode::new(320, 8, 0b00110110),
    RunCode::new(384, 8, 0b00110111),
    RunCode::new(448, 8, 0b01100100),
    RunCode::new(512, 8, 0b01100101),
    RunCode::new(576, 8, 0b01101000),
    RunCode::new(640, 8, 0b01100111),
    RunCode::new(704, 9, 0b011001100),
    RunCode::new(768, 9, 0b011001101),
    RunCode::new(832, 9, 0b011010010),
    RunCode::new(896, 9, 0b011010011),
    RunCode::new(960, 9, 0b011010100),
    RunCode::new(1024, 9, 0b011010101),
    RunCode::new(1088, 9, 0b011010110),
    RunCode::new(1152, 9, 0b011010111),
    RunCode::new(1216, 9, 0b011011000),
    RunCode::new(1280, 9, 0b011011001),
    RunCode::new(1344, 9, 0b011011010),
    RunCode::new(1408, 9, 0b011011011),
    RunCode::new(1472, 9, 0b010011000),
    RunCode::new(1536, 9, 0b010011001),
    RunCode::new(1600, 9, 0b010011010),
    RunCode::new(1664, 6, 0b011000),
    RunCode::new(1728, 9, 0b010011011),
];

/// Black terminating codes, runs 0 to 63.
pub(crate) const BLACK_TERMINATING: [RunCode; 64] = [
    RunCode::new(0, 10, 0b0000110111),
    RunCode::new(1, 3, 0b010),
    RunCode::new(2, 2, 0b11),
    RunCode::new(3, 2, 0b10),
    RunCode::new(4, 3, 0b011),
    RunCode::new(5, 4, 0b0011),
    RunCode::new(6, 4, 0b0010),
    RunCode::new(7, 5, 0b00011),
    RunCode::new(8, 6, 0b000101),
    RunCode::new(9, 6, 0b000100),
    RunCode::new(10, 7, 0b0000100),
    RunCode::new(11, 7, 0b0000101),
    RunCode::new(12, 7, 0b0000111),
    RunCode::new(13, 8, 0b00000100),
    RunCode::new(14, 8, 0b00000111),
    RunCode::new(15, 9, 0b000011000),
    RunCode::new(16, 10, 0b0000010111),
    RunCode::new(17, 10, 0b0000011000),
    RunCode::new(18, 10, 0b0000001000),
    RunCode::new(19, 11, 0b00001100111),
    RunCode::new(20, 11, 0b00001101000),
    RunCode::new(21, 11, 0b00001101100),
    RunCode::new(22, 11, 0b00000110111),
    RunCode::new(23, 11, 0b00000101000),
    RunCode::new(24, 11, 0b00000010111),
    RunCode::new(25, 11, 0b00000011000),
    RunCode::new(26, 12, 0b000011001010),
    RunCode::new(27, 12, 0b000011001011),
    RunCode::new(28, 12, 0b000011001100),
    RunCode::new(29, 12, 0b000011001101),
    RunCode::new(30, 12, 0b000001101000),
    RunCode::new(31, 12, 0b000001101001),
    RunCode::new(32, 12, 0b000001101010),
    RunCode::new(33, 12, 0b000001101011),
    RunCode::new(34, 12, 0b000011010010),
    RunCode::new(35, 12, 0b000011010011),
    RunCode::new(36, 12, 0b000011010100),
    RunCode::new(37, 12, 0b000011010101),
    RunCode::new(38, 12, 0b000011010110),
    RunCode::new(39, 12, 0b000011010111),
    RunCode::new(40, 12, 0b000001101100),
    RunCode::new(41, 12, 0b000001101101),
    RunCode::new(42, 12, 0b000011011010),
    RunCode::new(43, 12, 0b000011011011),
    RunCode::new(44, 12, 0b000001010100),
    RunCode::new(45, 12, 0b000001010101),
    RunCode::new(46, 12, 0b000001010110),
    RunCode::new(47, 12, 0b000001010111),
    RunCode::new(48, 12, 0b000001100100),
    RunCode::new(49, 12, 0b000001100101),
    RunCode::new(50, 12, 0b000001010010),
    RunCode::new(51, 12, 0b000001010011),
    RunCode::new(52, 12, 0b000000100100),
    RunCode::new(53, 12, 0b000000110111),
    RunCode::new(54, 12, 0b000000111000),
    RunCode::new(55, 12, 0b000000100111),
    RunCode::new(56, 12, 0b000000101000),
    RunCode::new(57, 12, 0b000001011000),
    RunCode::new(58, 12, 0b000001011001),
    RunCode::new(59, 12, 0b000000101011),
    RunCode::new(60, 12, 0b000000101100),
    RunCode::new(61, 12, 0b000001011010),
    RunCode::new(62, 12, 0b000001100110),
    RunCode::new(63, 12, 0b000001100111),
];

/// Black makeup codes, runs 64 to 1728.
pub(crate) const BLACK_MAKEUP: [RunCode; 27] = [
    RunCode::new(64, 10, 0b0000001111),
    RunCode::new(128, 12, 0b000011001000),
    RunCode::new(192, 12, 0b000011001001),
    RunCode::new(256, 12, 0b000001011011),
    RunCode::new(320, 12, 0b000000110011),
    RunCode::new(384, 12, 0b000000110100),
    RunCode::new(448, 12, 0b000000110101),
    RunCode::new(512, 13, 0b0000001101100),
    RunCode::new(576, 13, 0b0000001101101),
    RunCode::new(640, 13, 0b0000001001010),
    RunCode::new(704, 13, 0b0000001001011),
    RunCode::new(768, 13, 0b0000001001100),
    RunCode::new(832, 13, 0b0000001001101),
    RunCode::new(896, 13, 0b0000001110010),
    RunCode::new(960, 13, 0b0000001110011),
    RunCode::new(1024, 13, 0b0000001110100),
    RunCode::new(1088, 13, 0b0000001110101),
    RunCode::new(1152, 13, 0b0000001110110),
    RunCode::new(1216, 13, 0b0000001110111),
    RunCode::new(1280, 13, 0b0000001010010),
    RunCode::new(1344, 13, 0b0000001010011),
    RunCode::new(1408, 13, 0b0000001010100),
    RunCode::new(1472, 13, 0b0000001010101),
    RunCode::new(1536, 13, 0b0000001011010),
    RunCode::new(1600, 13, 0b0000001011011),
    RunCode::new(1664, 13, 0b0000001100100),
    RunCode::new(1728, 13, 0b0000001100101),
];

/// Makeup codes shared by both colours, runs 1792 to 2560.
pub(crate) const COMMON_MAKEUP: [RunCode; 13] = [
    RunCode::new(1792, 11, 0b00000001000),
    RunCode::new(1856, 11, 0b00000001100),
    RunCode::new(1920, 11, 0b00000001101),
    RunCode::new(1984, 12, 0b000000010010),
    RunCode::new(2048, 12, 0b000000010011),
    RunCode::new(2112, 12, 0b000000010100),
    RunCode::new(2176, 12, 0b000000010101),
    RunCode::new(2240, 12, 0b000000010110),
    RunCode::new(2304, 12, 0b000000010111),
    RunCode::new(2368, 12, 0b000000011100),
    RunCode::new(2432, 12, 0b000000011101),
    RunCode::new(2496, 12, 0b000000011110),
    RunCode::new(2560, 12, 0b000000011111),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(tree: &[Node], bits: &str) -> u16 {
        let mut node = 0usize;
        for (i, c) in bits.chars().enumerate() {
            let next = if c == '0' {
                tree[node].on_0
            } else {
                tree[node].on_1
            };
            if i == bits.len() - 1 || next == INVALID {
                return next;
            }
            node = next as usize;
        }
        INVALID
    }

    #[test]
    fn every_code_reaches_its_run() {
        for (tree, tables) in [
            (&WHITE_TREE, [&WHITE_TERMINATING[..], &WHITE_MAKEUP[..], &COMMON_MAKEUP[..]]),
            (&BLACK_TREE, [&BLACK_TERMINATING[..], &BLACK_MAKEUP[..], &COMMON_MAKEUP[..]]),
        ] {
            for entry in tables.iter().flat_map(|t| t.iter()) {
                assert!(entry.bits <= MAX_CODE_BITS);
                let bits = format!("{:0width$b}", entry.code, width = entry.bits as usize);
                assert_eq!(walk(tree, &bits), VALUE_FLAG | entry.run);
            }
        }
    }

    #[test]
    fn end_of_line_is_not_a_run() {
        assert_eq!(walk(&WHITE_TREE, "000000000"), INVALID);
    }

    #[test]
    fn mode_codes_round_trip_through_the_table() {
        for mode in [
            Mode::Pass,
            Mode::Horizontal,
            Mode::Vertical(0),
            Mode::Vertical(1),
            Mode::Vertical(-1),
            Mode::Vertical(2),
            Mode::Vertical(-2),
            Mode::Vertical(3),
            Mode::Vertical(-3),
            Mode::Uncompressed,
        ] {
            let (code, bits) = mode.code();
            let mut state = ModeState::Start;
            let mut result = None;
            for i in (0..bits).rev() {
                match state.step((code >> i) & 1) {
                    ModeStep::Next(next) => state = next,
                    ModeStep::Finish(m) => {
                        assert_eq!(i, 0);
                        result = Some(m);
                    }
                }
            }
            assert_eq!(result, Some(mode));
        }
    }

    #[test]
    fn makeup_lookup() {
        assert_eq!(makeup_code(true, 64).code, 0b11011);
        assert_eq!(makeup_code(false, 1728).run, 1728);
        assert_eq!(makeup_code(true, 2560).run, 2560);
        assert_eq!(terminating_code(false, 2).code, 0b11);
    }
}
