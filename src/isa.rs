//! Instruction descriptors and opcode decoding.
//!
//! `decode` and `decode_extended` are pure total functions: every byte maps
//! to exactly one [`Instruction`], including the unused primary opcodes
//! (which decode to [`Op::Invalid`], a defined one-byte no-op). The primary
//! space is one exhaustive table; the 0xCB-prefixed space is decoded
//! algorithmically from the opcode's bit fields.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Af,
    Bc,
    De,
    Hl,
    Sp,
}

/// Branch condition for conditional jumps, calls and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
}

/// Operation tag. `Prefix` marks the 0xCB escape byte itself; the CPU never
/// dispatches it because it re-fetches and decodes the extended opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    Ld,
    Push,
    Pop,
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
    Inc,
    Dec,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Rlca,
    Rla,
    Rrca,
    Rra,
    Jp,
    Jr,
    Call,
    Ret,
    Reti,
    Rst,
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit,
    Res,
    Set,
    Prefix,
    Invalid,
}

/// Operand shape. One variant per addressing form the instruction set uses;
/// execution matches on this exhaustively, so adding a form is a compile
/// error until every consumer handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// No operand bytes and no explicit target (NOP, DAA, RET, ...).
    Implied,
    /// Single 8-bit register.
    Reg(Reg8),
    /// Destination register, source register.
    RegReg(Reg8, Reg8),
    /// Destination register, 8-bit immediate.
    RegImm(Reg8),
    /// Single 16-bit register pair.
    Pair(Reg16),
    /// Destination pair, 16-bit immediate.
    PairImm(Reg16),
    /// Destination register, memory pointed to by a pair.
    RegPairPtr(Reg8, Reg16),
    /// Memory pointed to by a pair, source register.
    PairPtrReg(Reg16, Reg8),
    /// Memory pointed to by a pair, 8-bit immediate.
    PairPtrImm(Reg16),
    /// Memory pointed to by a pair (ALU/INC/DEC/shift target).
    PairPtr(Reg16),
    /// Register from (HL), then HL increments.
    RegHliPtr(Reg8),
    /// Register from (HL), then HL decrements.
    RegHldPtr(Reg8),
    /// (HL) from register, then HL increments.
    HliPtrReg(Reg8),
    /// (HL) from register, then HL decrements.
    HldPtrReg(Reg8),
    /// 8-bit immediate (accumulator-implicit ALU forms).
    Imm,
    /// Absolute 16-bit address, source register.
    AddrReg(Reg8),
    /// Destination register, absolute 16-bit address.
    RegAddr(Reg8),
    /// Absolute 16-bit address receiving SP.
    AddrSp,
    /// High page (0xFF00 + imm8), source register.
    HighImmReg(Reg8),
    /// Destination register, high page (0xFF00 + imm8).
    RegHighImm(Reg8),
    /// High page (0xFF00 + C) from A.
    HighCReg,
    /// A from high page (0xFF00 + C).
    RegHighC,
    /// SP from HL.
    SpHl,
    /// HL from SP plus signed 8-bit offset.
    HlSpImm,
    /// SP plus signed 8-bit offset (ADD SP, e8).
    SpImm,
    /// Absolute 16-bit jump/call target.
    Addr,
    /// Conditional absolute 16-bit target.
    CondAddr(Cond),
    /// Signed 8-bit relative target.
    Rel,
    /// Conditional signed 8-bit relative target.
    CondRel(Cond),
    /// Condition with no operand bytes (RET cc).
    CondImplied(Cond),
    /// Fixed restart vector address (0x00, 0x08, ..., 0x38).
    Vector(u8),
    /// Bit index and 8-bit register (BIT/RES/SET b, r).
    BitReg(u8, Reg8),
    /// Bit index and memory pointed to by HL.
    BitHlPtr(u8),
}

/// One decoded instruction. `cycles` is the T-cycle cost (branch-taken for
/// conditional control flow); `cycles_not_taken` the cost when a condition
/// fails. `length` counts every byte including the 0xCB prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub operand: Operand,
    pub length: u8,
    pub cycles: u8,
    pub cycles_not_taken: u8,
}

const fn ins(op: Op, operand: Operand, length: u8, cycles: u8) -> Instruction {
    Instruction {
        op,
        operand,
        length,
        cycles,
        cycles_not_taken: cycles,
    }
}

const fn br(op: Op, operand: Operand, length: u8, taken: u8, not_taken: u8) -> Instruction {
    Instruction {
        op,
        operand,
        length,
        cycles: taken,
        cycles_not_taken: not_taken,
    }
}

/// Decode a primary-space opcode.
pub fn decode(opcode: u8) -> Instruction {
    use Op::*;
    use Operand::*;
    use Reg16::*;
    use Reg8::*;

    match opcode {
        0x00 => ins(Nop, Implied, 1, 4),
        0x01 => ins(Ld, PairImm(Bc), 3, 12),
        0x02 => ins(Ld, PairPtrReg(Bc, A), 1, 8),
        0x03 => ins(Inc, Pair(Bc), 1, 8),
        0x04 => ins(Inc, Reg(B), 1, 4),
        0x05 => ins(Dec, Reg(B), 1, 4),
        0x06 => ins(Ld, RegImm(B), 2, 8),
        0x07 => ins(Rlca, Implied, 1, 4),
        0x08 => ins(Ld, AddrSp, 3, 20),
        0x09 => ins(Add, Pair(Bc), 1, 8),
        0x0A => ins(Ld, RegPairPtr(A, Bc), 1, 8),
        0x0B => ins(Dec, Pair(Bc), 1, 8),
        0x0C => ins(Inc, Reg(C), 1, 4),
        0x0D => ins(Dec, Reg(C), 1, 4),
        0x0E => ins(Ld, RegImm(C), 2, 8),
        0x0F => ins(Rrca, Implied, 1, 4),

        0x10 => ins(Stop, Implied, 2, 4),
        0x11 => ins(Ld, PairImm(De), 3, 12),
        0x12 => ins(Ld, PairPtrReg(De, A), 1, 8),
        0x13 => ins(Inc, Pair(De), 1, 8),
        0x14 => ins(Inc, Reg(D), 1, 4),
        0x15 => ins(Dec, Reg(D), 1, 4),
        0x16 => ins(Ld, RegImm(D), 2, 8),
        0x17 => ins(Rla, Implied, 1, 4),
        0x18 => ins(Jr, Rel, 2, 12),
        0x19 => ins(Add, Pair(De), 1, 8),
        0x1A => ins(Ld, RegPairPtr(A, De), 1, 8),
        0x1B => ins(Dec, Pair(De), 1, 8),
        0x1C => ins(Inc, Reg(E), 1, 4),
        0x1D => ins(Dec, Reg(E), 1, 4),
        0x1E => ins(Ld, RegImm(E), 2, 8),
        0x1F => ins(Rra, Implied, 1, 4),

        0x20 => br(Jr, CondRel(Cond::Nz), 2, 12, 8),
        0x21 => ins(Ld, PairImm(Hl), 3, 12),
        0x22 => ins(Ld, HliPtrReg(A), 1, 8),
        0x23 => ins(Inc, Pair(Hl), 1, 8),
        0x24 => ins(Inc, Reg(H), 1, 4),
        0x25 => ins(Dec, Reg(H), 1, 4),
        0x26 => ins(Ld, RegImm(H), 2, 8),
        0x27 => ins(Daa, Implied, 1, 4),
        0x28 => br(Jr, CondRel(Cond::Z), 2, 12, 8),
        0x29 => ins(Add, Pair(Hl), 1, 8),
        0x2A => ins(Ld, RegHliPtr(A), 1, 8),
        0x2B => ins(Dec, Pair(Hl), 1, 8),
        0x2C => ins(Inc, Reg(L), 1, 4),
        0x2D => ins(Dec, Reg(L), 1, 4),
        0x2E => ins(Ld, RegImm(L), 2, 8),
        0x2F => ins(Cpl, Implied, 1, 4),

        0x30 => br(Jr, CondRel(Cond::Nc), 2, 12, 8),
        0x31 => ins(Ld, PairImm(Sp), 3, 12),
        0x32 => ins(Ld, HldPtrReg(A), 1, 8),
        0x33 => ins(Inc, Pair(Sp), 1, 8),
        0x34 => ins(Inc, PairPtr(Hl), 1, 12),
        0x35 => ins(Dec, PairPtr(Hl), 1, 12),
        0x36 => ins(Ld, PairPtrImm(Hl), 2, 12),
        0x37 => ins(Scf, Implied, 1, 4),
        0x38 => br(Jr, CondRel(Cond::C), 2, 12, 8),
        0x39 => ins(Add, Pair(Sp), 1, 8),
        0x3A => ins(Ld, RegHldPtr(A), 1, 8),
        0x3B => ins(Dec, Pair(Sp), 1, 8),
        0x3C => ins(Inc, Reg(A), 1, 4),
        0x3D => ins(Dec, Reg(A), 1, 4),
        0x3E => ins(Ld, RegImm(A), 2, 8),
        0x3F => ins(Ccf, Implied, 1, 4),

        0x40 => ins(Ld, RegReg(B, B), 1, 4),
        0x41 => ins(Ld, RegReg(B, C), 1, 4),
        0x42 => ins(Ld, RegReg(B, D), 1, 4),
        0x43 => ins(Ld, RegReg(B, E), 1, 4),
        0x44 => ins(Ld, RegReg(B, H), 1, 4),
        0x45 => ins(Ld, RegReg(B, L), 1, 4),
        0x46 => ins(Ld, RegPairPtr(B, Hl), 1, 8),
        0x47 => ins(Ld, RegReg(B, A), 1, 4),
        0x48 => ins(Ld, RegReg(C, B), 1, 4),
        0x49 => ins(Ld, RegReg(C, C), 1, 4),
        0x4A => ins(Ld, RegReg(C, D), 1, 4),
        0x4B => ins(Ld, RegReg(C, E), 1, 4),
        0x4C => ins(Ld, RegReg(C, H), 1, 4),
        0x4D => ins(Ld, RegReg(C, L), 1, 4),
        0x4E => ins(Ld, RegPairPtr(C, Hl), 1, 8),
        0x4F => ins(Ld, RegReg(C, A), 1, 4),

        0x50 => ins(Ld, RegReg(D, B), 1, 4),
        0x51 => ins(Ld, RegReg(D, C), 1, 4),
        0x52 => ins(Ld, RegReg(D, D), 1, 4),
        0x53 => ins(Ld, RegReg(D, E), 1, 4),
        0x54 => ins(Ld, RegReg(D, H), 1, 4),
        0x55 => ins(Ld, RegReg(D, L), 1, 4),
        0x56 => ins(Ld, RegPairPtr(D, Hl), 1, 8),
        0x57 => ins(Ld, RegReg(D, A), 1, 4),
        0x58 => ins(Ld, RegReg(E, B), 1, 4),
        0x59 => ins(Ld, RegReg(E, C), 1, 4),
        0x5A => ins(Ld, RegReg(E, D), 1, 4),
        0x5B => ins(Ld, RegReg(E, E), 1, 4),
        0x5C => ins(Ld, RegReg(E, H), 1, 4),
        0x5D => ins(Ld, RegReg(E, L), 1, 4),
        0x5E => ins(Ld, RegPairPtr(E, Hl), 1, 8),
        0x5F => ins(Ld, RegReg(E, A), 1, 4),

        0x60 => ins(Ld, RegReg(H, B), 1, 4),
        0x61 => ins(Ld, RegReg(H, C), 1, 4),
        0x62 => ins(Ld, RegReg(H, D), 1, 4),
        0x63 => ins(Ld, RegReg(H, E), 1, 4),
        0x64 => ins(Ld, RegReg(H, H), 1, 4),
        0x65 => ins(Ld, RegReg(H, L), 1, 4),
        0x66 => ins(Ld, RegPairPtr(H, Hl), 1, 8),
        0x67 => ins(Ld, RegReg(H, A), 1, 4),
        0x68 => ins(Ld, RegReg(L, B), 1, 4),
        0x69 => ins(Ld, RegReg(L, C), 1, 4),
        0x6A => ins(Ld, RegReg(L, D), 1, 4),
        0x6B => ins(Ld, RegReg(L, E), 1, 4),
        0x6C => ins(Ld, RegReg(L, H), 1, 4),
        0x6D => ins(Ld, RegReg(L, L), 1, 4),
        0x6E => ins(Ld, RegPairPtr(L, Hl), 1, 8),
        0x6F => ins(Ld, RegReg(L, A), 1, 4),

        0x70 => ins(Ld, PairPtrReg(Hl, B), 1, 8),
        0x71 => ins(Ld, PairPtrReg(Hl, C), 1, 8),
        0x72 => ins(Ld, PairPtrReg(Hl, D), 1, 8),
        0x73 => ins(Ld, PairPtrReg(Hl, E), 1, 8),
        0x74 => ins(Ld, PairPtrReg(Hl, H), 1, 8),
        0x75 => ins(Ld, PairPtrReg(Hl, L), 1, 8),
        0x76 => ins(Halt, Implied, 1, 4),
        0x77 => ins(Ld, PairPtrReg(Hl, A), 1, 8),
        0x78 => ins(Ld, RegReg(A, B), 1, 4),
        0x79 => ins(Ld, RegReg(A, C), 1, 4),
        0x7A => ins(Ld, RegReg(A, D), 1, 4),
        0x7B => ins(Ld, RegReg(A, E), 1, 4),
        0x7C => ins(Ld, RegReg(A, H), 1, 4),
        0x7D => ins(Ld, RegReg(A, L), 1, 4),
        0x7E => ins(Ld, RegPairPtr(A, Hl), 1, 8),
        0x7F => ins(Ld, RegReg(A, A), 1, 4),

        0x80 => ins(Add, Reg(B), 1, 4),
        0x81 => ins(Add, Reg(C), 1, 4),
        0x82 => ins(Add, Reg(D), 1, 4),
        0x83 => ins(Add, Reg(E), 1, 4),
        0x84 => ins(Add, Reg(H), 1, 4),
        0x85 => ins(Add, Reg(L), 1, 4),
        0x86 => ins(Add, PairPtr(Hl), 1, 8),
        0x87 => ins(Add, Reg(A), 1, 4),
        0x88 => ins(Adc, Reg(B), 1, 4),
        0x89 => ins(Adc, Reg(C), 1, 4),
        0x8A => ins(Adc, Reg(D), 1, 4),
        0x8B => ins(Adc, Reg(E), 1, 4),
        0x8C => ins(Adc, Reg(H), 1, 4),
        0x8D => ins(Adc, Reg(L), 1, 4),
        0x8E => ins(Adc, PairPtr(Hl), 1, 8),
        0x8F => ins(Adc, Reg(A), 1, 4),

        0x90 => ins(Sub, Reg(B), 1, 4),
        0x91 => ins(Sub, Reg(C), 1, 4),
        0x92 => ins(Sub, Reg(D), 1, 4),
        0x93 => ins(Sub, Reg(E), 1, 4),
        0x94 => ins(Sub, Reg(H), 1, 4),
        0x95 => ins(Sub, Reg(L), 1, 4),
        0x96 => ins(Sub, PairPtr(Hl), 1, 8),
        0x97 => ins(Sub, Reg(A), 1, 4),
        0x98 => ins(Sbc, Reg(B), 1, 4),
        0x99 => ins(Sbc, Reg(C), 1, 4),
        0x9A => ins(Sbc, Reg(D), 1, 4),
        0x9B => ins(Sbc, Reg(E), 1, 4),
        0x9C => ins(Sbc, Reg(H), 1, 4),
        0x9D => ins(Sbc, Reg(L), 1, 4),
        0x9E => ins(Sbc, PairPtr(Hl), 1, 8),
        0x9F => ins(Sbc, Reg(A), 1, 4),

        0xA0 => ins(And, Reg(B), 1, 4),
        0xA1 => ins(And, Reg(C), 1, 4),
        0xA2 => ins(And, Reg(D), 1, 4),
        0xA3 => ins(And, Reg(E), 1, 4),
        0xA4 => ins(And, Reg(H), 1, 4),
        0xA5 => ins(And, Reg(L), 1, 4),
        0xA6 => ins(And, PairPtr(Hl), 1, 8),
        0xA7 => ins(And, Reg(A), 1, 4),
        0xA8 => ins(Xor, Reg(B), 1, 4),
        0xA9 => ins(Xor, Reg(C), 1, 4),
        0xAA => ins(Xor, Reg(D), 1, 4),
        0xAB => ins(Xor, Reg(E), 1, 4),
        0xAC => ins(Xor, Reg(H), 1, 4),
        0xAD => ins(Xor, Reg(L), 1, 4),
        0xAE => ins(Xor, PairPtr(Hl), 1, 8),
        0xAF => ins(Xor, Reg(A), 1, 4),

        0xB0 => ins(Or, Reg(B), 1, 4),
        0xB1 => ins(Or, Reg(C), 1, 4),
        0xB2 => ins(Or, Reg(D), 1, 4),
        0xB3 => ins(Or, Reg(E), 1, 4),
        0xB4 => ins(Or, Reg(H), 1, 4),
        0xB5 => ins(Or, Reg(L), 1, 4),
        0xB6 => ins(Or, PairPtr(Hl), 1, 8),
        0xB7 => ins(Or, Reg(A), 1, 4),
        0xB8 => ins(Cp, Reg(B), 1, 4),
        0xB9 => ins(Cp, Reg(C), 1, 4),
        0xBA => ins(Cp, Reg(D), 1, 4),
        0xBB => ins(Cp, Reg(E), 1, 4),
        0xBC => ins(Cp, Reg(H), 1, 4),
        0xBD => ins(Cp, Reg(L), 1, 4),
        0xBE => ins(Cp, PairPtr(Hl), 1, 8),
        0xBF => ins(Cp, Reg(A), 1, 4),

        0xC0 => br(Ret, CondImplied(Cond::Nz), 1, 20, 8),
        0xC1 => ins(Pop, Pair(Bc), 1, 12),
        0xC2 => br(Jp, CondAddr(Cond::Nz), 3, 16, 12),
        0xC3 => ins(Jp, Addr, 3, 16),
        0xC4 => br(Call, CondAddr(Cond::Nz), 3, 24, 12),
        0xC5 => ins(Push, Pair(Bc), 1, 16),
        0xC6 => ins(Add, Imm, 2, 8),
        0xC7 => ins(Rst, Vector(0x00), 1, 16),
        0xC8 => br(Ret, CondImplied(Cond::Z), 1, 20, 8),
        0xC9 => ins(Ret, Implied, 1, 16),
        0xCA => br(Jp, CondAddr(Cond::Z), 3, 16, 12),
        0xCB => ins(Prefix, Implied, 1, 4),
        0xCC => br(Call, CondAddr(Cond::Z), 3, 24, 12),
        0xCD => ins(Call, Addr, 3, 24),
        0xCE => ins(Adc, Imm, 2, 8),
        0xCF => ins(Rst, Vector(0x08), 1, 16),

        0xD0 => br(Ret, CondImplied(Cond::Nc), 1, 20, 8),
        0xD1 => ins(Pop, Pair(De), 1, 12),
        0xD2 => br(Jp, CondAddr(Cond::Nc), 3, 16, 12),
        0xD4 => br(Call, CondAddr(Cond::Nc), 3, 24, 12),
        0xD5 => ins(Push, Pair(De), 1, 16),
        0xD6 => ins(Sub, Imm, 2, 8),
        0xD7 => ins(Rst, Vector(0x10), 1, 16),
        0xD8 => br(Ret, CondImplied(Cond::C), 1, 20, 8),
        0xD9 => ins(Reti, Implied, 1, 16),
        0xDA => br(Jp, CondAddr(Cond::C), 3, 16, 12),
        0xDC => br(Call, CondAddr(Cond::C), 3, 24, 12),
        0xDE => ins(Sbc, Imm, 2, 8),
        0xDF => ins(Rst, Vector(0x18), 1, 16),

        0xE0 => ins(Ld, HighImmReg(A), 2, 12),
        0xE1 => ins(Pop, Pair(Hl), 1, 12),
        0xE2 => ins(Ld, HighCReg, 1, 8),
        0xE5 => ins(Push, Pair(Hl), 1, 16),
        0xE6 => ins(And, Imm, 2, 8),
        0xE7 => ins(Rst, Vector(0x20), 1, 16),
        0xE8 => ins(Add, SpImm, 2, 16),
        0xE9 => ins(Jp, Pair(Hl), 1, 4),
        0xEA => ins(Ld, AddrReg(A), 3, 16),
        0xEE => ins(Xor, Imm, 2, 8),
        0xEF => ins(Rst, Vector(0x28), 1, 16),

        0xF0 => ins(Ld, RegHighImm(A), 2, 12),
        0xF1 => ins(Pop, Pair(Af), 1, 12),
        0xF2 => ins(Ld, RegHighC, 1, 8),
        0xF3 => ins(Di, Implied, 1, 4),
        0xF5 => ins(Push, Pair(Af), 1, 16),
        0xF6 => ins(Or, Imm, 2, 8),
        0xF7 => ins(Rst, Vector(0x30), 1, 16),
        0xF8 => ins(Ld, HlSpImm, 2, 12),
        0xF9 => ins(Ld, SpHl, 1, 8),
        0xFA => ins(Ld, RegAddr(A), 3, 16),
        0xFB => ins(Ei, Implied, 1, 4),
        0xFE => ins(Cp, Imm, 2, 8),
        0xFF => ins(Rst, Vector(0x38), 1, 16),

        // 0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB..0xED, 0xF4, 0xFC, 0xFD
        _ => ins(Invalid, Implied, 1, 4),
    }
}

const SHIFT_OPS: [Op; 8] = [
    Op::Rlc,
    Op::Rrc,
    Op::Rl,
    Op::Rr,
    Op::Sla,
    Op::Sra,
    Op::Swap,
    Op::Srl,
];

fn cb_reg(sel: u8) -> Reg8 {
    match sel {
        0 => Reg8::B,
        1 => Reg8::C,
        2 => Reg8::D,
        3 => Reg8::E,
        4 => Reg8::H,
        5 => Reg8::L,
        _ => Reg8::A,
    }
}

/// Decode an extended-space (0xCB-prefixed) opcode.
///
/// The low 3 bits select the target (B, C, D, E, H, L, (HL), A), bits 3-5
/// the suboperation or bit index, bits 6-7 the family.
pub fn decode_extended(opcode: u8) -> Instruction {
    let target = opcode & 0x07;
    let hl = target == 6;
    let sub = (opcode >> 3) & 0x07;

    let (op, operand, cycles) = match opcode >> 6 {
        0 => {
            let operand = if hl {
                Operand::PairPtr(Reg16::Hl)
            } else {
                Operand::Reg(cb_reg(target))
            };
            (SHIFT_OPS[sub as usize], operand, if hl { 16 } else { 8 })
        }
        family => {
            let operand = if hl {
                Operand::BitHlPtr(sub)
            } else {
                Operand::BitReg(sub, cb_reg(target))
            };
            let op = match family {
                1 => Op::Bit,
                2 => Op::Res,
                _ => Op::Set,
            };
            // BIT never writes back, so its (HL) form skips the store cycle.
            let cycles = match (family, hl) {
                (1, true) => 12,
                (_, true) => 16,
                _ => 8,
            };
            (op, operand, cycles)
        }
    };

    ins(op, operand, 2, cycles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_is_pure_and_total() {
        for opcode in 0..=0xFFu16 {
            let a = decode(opcode as u8);
            let b = decode(opcode as u8);
            assert_eq!(a, b, "primary {opcode:#04X}");
            assert!(a.length >= 1 && a.length <= 3);
            assert!(a.cycles >= 4);
            assert!(a.cycles_not_taken <= a.cycles);

            let a = decode_extended(opcode as u8);
            let b = decode_extended(opcode as u8);
            assert_eq!(a, b, "extended {opcode:#04X}");
            assert_eq!(a.length, 2);
        }
    }

    #[test]
    fn unused_primary_opcodes_are_invalid_noops() {
        for opcode in [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD] {
            let inst = decode(opcode);
            assert_eq!(inst.op, Op::Invalid, "{opcode:#04X}");
            assert_eq!(inst.length, 1);
            assert_eq!(inst.cycles, 4);
        }
    }

    #[test]
    fn extended_decode_matches_reference_table() {
        // The whole 0xCB matrix transcribed independently of the decode
        // formulas: one row of eight opcodes per suboperation, targets in
        // B, C, D, E, H, L, (HL), A column order. BIT skips the (HL)
        // write-back cycle; every other (HL) form pays it.
        const COLUMNS: [Option<Reg8>; 8] = [
            Some(Reg8::B),
            Some(Reg8::C),
            Some(Reg8::D),
            Some(Reg8::E),
            Some(Reg8::H),
            Some(Reg8::L),
            None,
            Some(Reg8::A),
        ];
        const ROWS: [(Op, Option<u8>); 32] = [
            (Op::Rlc, None),     // 0x00-0x07
            (Op::Rrc, None),     // 0x08-0x0F
            (Op::Rl, None),      // 0x10-0x17
            (Op::Rr, None),      // 0x18-0x1F
            (Op::Sla, None),     // 0x20-0x27
            (Op::Sra, None),     // 0x28-0x2F
            (Op::Swap, None),    // 0x30-0x37
            (Op::Srl, None),     // 0x38-0x3F
            (Op::Bit, Some(0)),  // 0x40-0x47
            (Op::Bit, Some(1)),  // 0x48-0x4F
            (Op::Bit, Some(2)),  // 0x50-0x57
            (Op::Bit, Some(3)),  // 0x58-0x5F
            (Op::Bit, Some(4)),  // 0x60-0x67
            (Op::Bit, Some(5)),  // 0x68-0x6F
            (Op::Bit, Some(6)),  // 0x70-0x77
            (Op::Bit, Some(7)),  // 0x78-0x7F
            (Op::Res, Some(0)),  // 0x80-0x87
            (Op::Res, Some(1)),  // 0x88-0x8F
            (Op::Res, Some(2)),  // 0x90-0x97
            (Op::Res, Some(3)),  // 0x98-0x9F
            (Op::Res, Some(4)),  // 0xA0-0xA7
            (Op::Res, Some(5)),  // 0xA8-0xAF
            (Op::Res, Some(6)),  // 0xB0-0xB7
            (Op::Res, Some(7)),  // 0xB8-0xBF
            (Op::Set, Some(0)),  // 0xC0-0xC7
            (Op::Set, Some(1)),  // 0xC8-0xCF
            (Op::Set, Some(2)),  // 0xD0-0xD7
            (Op::Set, Some(3)),  // 0xD8-0xDF
            (Op::Set, Some(4)),  // 0xE0-0xE7
            (Op::Set, Some(5)),  // 0xE8-0xEF
            (Op::Set, Some(6)),  // 0xF0-0xF7
            (Op::Set, Some(7)),  // 0xF8-0xFF
        ];

        for (row, &(op, bit)) in ROWS.iter().enumerate() {
            for (col, &target) in COLUMNS.iter().enumerate() {
                let opcode = (row * 8 + col) as u8;
                let inst = decode_extended(opcode);
                let operand = match (bit, target) {
                    (None, Some(r)) => Operand::Reg(r),
                    (None, None) => Operand::PairPtr(Reg16::Hl),
                    (Some(b), Some(r)) => Operand::BitReg(b, r),
                    (Some(b), None) => Operand::BitHlPtr(b),
                };
                let cycles = match (target, op) {
                    (Some(_), _) => 8,
                    (None, Op::Bit) => 12,
                    (None, _) => 16,
                };
                assert_eq!(inst.op, op, "{opcode:#04X}");
                assert_eq!(inst.operand, operand, "{opcode:#04X}");
                assert_eq!(inst.length, 2, "{opcode:#04X}");
                assert_eq!(inst.cycles, cycles, "{opcode:#04X}");
            }
        }
    }
}
