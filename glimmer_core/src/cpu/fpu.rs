//! Coprocessor 1: the single precision FPU of the EE.
//!
//! The FPU is not IEEE 754 compliant: it has no infinities, NaNs or denormals. Operands with an
//! all-ones exponent are treated as the largest finite value of the same sign, denormal operands
//! as zero. Results that overflow clamp to the largest finite value and results that underflow
//! flush to zero, setting the O/U flags (and their sticky counterparts) in FCR31.

/// FCR0, the implementation and revision register.
pub const FCR0: u32 = 0x2E30;

/// The largest finite value, as raw bits, without sign.
const MAX_BITS: u32 = 0x7F7F_FFFF;
const SIGN: u32 = 0x8000_0000;

/// FCR31, the control and status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control(pub u32);

impl Control {
    /// Condition flag, set by compares and tested by `BC1x`.
    pub const C: u32 = 1 << 23;
    /// Invalid operation.
    pub const I: u32 = 1 << 17;
    /// Division by zero.
    pub const D: u32 = 1 << 16;
    /// Overflow.
    pub const O: u32 = 1 << 15;
    /// Underflow.
    pub const U: u32 = 1 << 14;
    pub const SI: u32 = 1 << 6;
    pub const SD: u32 = 1 << 5;
    pub const SO: u32 = 1 << 4;
    pub const SU: u32 = 1 << 3;

    /// Bits that can be written through `CTC1`.
    const WRITABLE: u32 = Self::C
        | Self::I
        | Self::D
        | Self::O
        | Self::U
        | Self::SI
        | Self::SD
        | Self::SO
        | Self::SU;

    /// Bits that always read as one.
    const FIXED: u32 = 0x0100_0001;

    #[inline(always)]
    pub fn condition(self) -> bool {
        self.0 & Self::C != 0
    }

    #[inline(always)]
    pub fn set_condition(&mut self, value: bool) {
        if value {
            self.0 |= Self::C;
        } else {
            self.0 &= !Self::C;
        }
    }

    #[inline(always)]
    pub fn has(self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Updates the O and U flags from the result of an arithmetic operation. The sticky flags
    /// accumulate.
    fn set_rounding_flags(&mut self, flags: ResultFlags) {
        self.0 &= !(Self::O | Self::U);
        if flags.overflow {
            self.0 |= Self::O | Self::SO;
        }
        if flags.underflow {
            self.0 |= Self::U | Self::SU;
        }
    }

    /// Updates the I and D flags from a division or square root. The sticky flags accumulate.
    fn set_division_flags(&mut self, invalid: bool, by_zero: bool) {
        self.0 &= !(Self::I | Self::D);
        if invalid {
            self.0 |= Self::I | Self::SI;
        }
        if by_zero {
            self.0 |= Self::D | Self::SD;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ResultFlags {
    overflow: bool,
    underflow: bool,
}

/// Reads a raw operand the way the FPU interprets it.
#[inline]
pub fn operand(bits: u32) -> f32 {
    let exponent = (bits >> 23) & 0xFF;
    match exponent {
        0 => f32::from_bits(bits & SIGN),
        0xFF => f32::from_bits((bits & SIGN) | MAX_BITS),
        _ => f32::from_bits(bits),
    }
}

/// Converts a host result to the bits the FPU would produce.
#[inline]
fn result(value: f32) -> (u32, ResultFlags) {
    let bits = value.to_bits();
    let sign = bits & SIGN;

    if !value.is_finite() {
        (
            sign | MAX_BITS,
            ResultFlags {
                overflow: true,
                underflow: false,
            },
        )
    } else if value != 0.0 && !value.is_normal() {
        (
            sign,
            ResultFlags {
                overflow: false,
                underflow: true,
            },
        )
    } else {
        (bits, ResultFlags::default())
    }
}

/// A comparison performed by `C.cond.S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    False,
    Equal,
    LessThan,
    LessOrEqual,
}

/// The state of the FPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fpu {
    /// The floating point registers, as raw bits.
    pub fpr: [u32; 32],
    /// The accumulator used by the `*A` and multiply-add operations.
    pub acc: u32,
    pub control: Control,
}

impl Default for Fpu {
    fn default() -> Self {
        Self {
            fpr: [0; 32],
            acc: 0,
            control: Control(Control::FIXED),
        }
    }
}

impl Fpu {
    #[inline(always)]
    pub fn read(&self, index: u8) -> u32 {
        self.fpr[usize::from(index & 0x1F)]
    }

    #[inline(always)]
    pub fn write(&mut self, index: u8, value: u32) {
        self.fpr[usize::from(index & 0x1F)] = value;
    }

    /// Reads a control register as done by `CFC1`. Only FCR0 and FCR31 exist.
    pub fn read_control(&self, index: u8) -> u32 {
        match index & 0x1F {
            0 => FCR0,
            31 => self.control.0,
            _ => 0,
        }
    }

    /// Writes a control register as done by `CTC1`. Only FCR31 is writable.
    pub fn write_control(&mut self, index: u8, value: u32) {
        if index & 0x1F == 31 {
            self.control = Control((value & Control::WRITABLE) | Control::FIXED);
        }
    }

    #[inline(always)]
    fn get(&self, index: u8) -> f32 {
        operand(self.read(index))
    }

    fn store(&mut self, fd: u8, value: f32) {
        let (bits, flags) = result(value);
        self.control.set_rounding_flags(flags);
        self.write(fd, bits);
    }

    fn store_acc(&mut self, value: f32) {
        let (bits, flags) = result(value);
        self.control.set_rounding_flags(flags);
        self.acc = bits;
    }

    pub fn add(&mut self, fd: u8, fs: u8, ft: u8) {
        self.store(fd, self.get(fs) + self.get(ft));
    }

    pub fn sub(&mut self, fd: u8, fs: u8, ft: u8) {
        self.store(fd, self.get(fs) - self.get(ft));
    }

    pub fn mul(&mut self, fd: u8, fs: u8, ft: u8) {
        self.store(fd, self.get(fs) * self.get(ft));
    }

    pub fn div(&mut self, fd: u8, fs: u8, ft: u8) {
        let (fs_bits, ft_bits) = (self.read(fs), self.read(ft));
        let (numerator, denominator) = (operand(fs_bits), operand(ft_bits));

        if denominator == 0.0 {
            let invalid = numerator == 0.0;
            self.control.set_division_flags(invalid, !invalid);
            self.write(fd, ((fs_bits ^ ft_bits) & SIGN) | MAX_BITS);
            return;
        }

        self.control.set_division_flags(false, false);
        self.store(fd, numerator / denominator);
    }

    pub fn sqrt(&mut self, fd: u8, ft: u8) {
        let value = self.get(ft);
        self.control.set_division_flags(value < 0.0, false);

        let (bits, _) = result(value.abs().sqrt());
        self.write(fd, bits);
    }

    pub fn rsqrt(&mut self, fd: u8, fs: u8, ft: u8) {
        let (numerator, denominator) = (self.get(fs), self.get(ft));

        if denominator == 0.0 {
            self.control.set_division_flags(false, true);
            let sign = self.read(fs) & SIGN;
            self.write(fd, sign | MAX_BITS);
            return;
        }

        self.control.set_division_flags(denominator < 0.0, false);
        self.store(fd, numerator / denominator.abs().sqrt());
    }

    pub fn abs(&mut self, fd: u8, fs: u8) {
        self.write(fd, self.read(fs) & !SIGN);
        self.control.set_rounding_flags(ResultFlags::default());
    }

    pub fn mov(&mut self, fd: u8, fs: u8) {
        self.write(fd, self.read(fs));
    }

    pub fn neg(&mut self, fd: u8, fs: u8) {
        self.write(fd, self.read(fs) ^ SIGN);
        self.control.set_rounding_flags(ResultFlags::default());
    }

    pub fn adda(&mut self, fs: u8, ft: u8) {
        self.store_acc(self.get(fs) + self.get(ft));
    }

    pub fn suba(&mut self, fs: u8, ft: u8) {
        self.store_acc(self.get(fs) - self.get(ft));
    }

    pub fn mula(&mut self, fs: u8, ft: u8) {
        self.store_acc(self.get(fs) * self.get(ft));
    }

    /// `fd = acc + fs * ft`
    pub fn madd(&mut self, fd: u8, fs: u8, ft: u8) {
        self.store(fd, operand(self.acc) + self.get(fs) * self.get(ft));
    }

    /// `fd = acc - fs * ft`
    pub fn msub(&mut self, fd: u8, fs: u8, ft: u8) {
        self.store(fd, operand(self.acc) - self.get(fs) * self.get(ft));
    }

    pub fn madda(&mut self, fs: u8, ft: u8) {
        self.store_acc(operand(self.acc) + self.get(fs) * self.get(ft));
    }

    pub fn msuba(&mut self, fs: u8, ft: u8) {
        self.store_acc(operand(self.acc) - self.get(fs) * self.get(ft));
    }

    pub fn max(&mut self, fd: u8, fs: u8, ft: u8) {
        let value = self.get(fs).max(self.get(ft));
        self.write(fd, value.to_bits());
        self.control.set_rounding_flags(ResultFlags::default());
    }

    pub fn min(&mut self, fd: u8, fs: u8, ft: u8) {
        let value = self.get(fs).min(self.get(ft));
        self.write(fd, value.to_bits());
        self.control.set_rounding_flags(ResultFlags::default());
    }

    /// `CVT.W.S`: truncates towards zero, saturating out of range values.
    pub fn cvt_w(&mut self, fd: u8, fs: u8) {
        let bits = self.read(fs);
        let exponent = (bits >> 23) & 0xFF;

        let value = if exponent >= 0x9E {
            if bits & SIGN != 0 { i32::MIN } else { i32::MAX }
        } else {
            operand(bits) as i32
        };

        self.write(fd, value as u32);
    }

    /// `CVT.S.W`
    pub fn cvt_s(&mut self, fd: u8, fs: u8) {
        let value = self.read(fs) as i32 as f32;
        self.write(fd, value.to_bits());
    }

    /// `C.cond.S`: sets or clears the condition flag.
    pub fn compare(&mut self, condition: Condition, fs: u8, ft: u8) {
        let (a, b) = (self.get(fs), self.get(ft));
        let value = match condition {
            Condition::False => false,
            Condition::Equal => a == b,
            Condition::LessThan => a < b,
            Condition::LessOrEqual => a <= b,
        };

        self.control.set_condition(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fpu_with(values: &[(u8, f32)]) -> Fpu {
        let mut fpu = Fpu::default();
        for &(index, value) in values {
            fpu.write(index, value.to_bits());
        }

        fpu
    }

    #[test]
    fn infinity_operand_is_max() {
        assert_eq!(operand(f32::INFINITY.to_bits()), f32::MAX);
        assert_eq!(operand(f32::NEG_INFINITY.to_bits()), -f32::MAX);
        assert_eq!(operand(f32::NAN.to_bits()).to_bits(), MAX_BITS);
    }

    #[test]
    fn denormal_operand_is_zero() {
        assert_eq!(operand(1).to_bits(), 0);
        assert_eq!(operand(SIGN | 1).to_bits(), SIGN);
    }

    #[test]
    fn overflow_clamps() {
        let mut fpu = fpu_with(&[(1, f32::MAX), (2, 2.0)]);
        fpu.mul(0, 1, 2);

        assert_eq!(fpu.read(0), MAX_BITS);
        assert!(fpu.control.has(Control::O | Control::SO));

        // O is per operation, SO sticks
        fpu.add(0, 2, 2);
        assert!(!fpu.control.has(Control::O));
        assert!(fpu.control.has(Control::SO));
    }

    #[test]
    fn underflow_flushes() {
        let mut fpu = fpu_with(&[(1, f32::MIN_POSITIVE), (2, 0.5)]);
        fpu.mul(0, 1, 2);

        assert_eq!(fpu.read(0), 0);
        assert!(fpu.control.has(Control::U | Control::SU));
    }

    #[test]
    fn division_by_zero() {
        let mut fpu = fpu_with(&[(1, -3.0), (2, 0.0)]);
        fpu.div(0, 1, 2);

        assert_eq!(fpu.read(0), SIGN | MAX_BITS);
        assert!(fpu.control.has(Control::D | Control::SD));
        assert!(!fpu.control.has(Control::I));

        fpu.div(0, 2, 2);
        assert!(fpu.control.has(Control::I | Control::SI));
        assert!(!fpu.control.has(Control::D));
    }

    #[test]
    fn sqrt_of_negative_uses_magnitude() {
        let mut fpu = fpu_with(&[(1, -4.0)]);
        fpu.sqrt(0, 1);

        assert_eq!(f32::from_bits(fpu.read(0)), 2.0);
        assert!(fpu.control.has(Control::I));
    }

    #[test]
    fn multiply_accumulate() {
        let mut fpu = fpu_with(&[(1, 2.0), (2, 3.0), (3, 1.0)]);
        fpu.mula(3, 3);
        fpu.madd(0, 1, 2);
        assert_eq!(f32::from_bits(fpu.read(0)), 7.0);

        fpu.msuba(1, 2);
        assert_eq!(f32::from_bits(fpu.acc), -5.0);
    }

    #[test]
    fn conversions_saturate() {
        let mut fpu = fpu_with(&[(1, 3.0e10), (2, -3.0e10), (3, -7.9)]);
        fpu.cvt_w(0, 1);
        assert_eq!(fpu.read(0), i32::MAX as u32);
        fpu.cvt_w(0, 2);
        assert_eq!(fpu.read(0), i32::MIN as u32);
        fpu.cvt_w(0, 3);
        assert_eq!(fpu.read(0) as i32, -7);
    }

    #[test]
    fn control_registers() {
        let mut fpu = Fpu::default();
        assert_eq!(fpu.read_control(0), FCR0);

        fpu.write_control(0, 0);
        assert_eq!(fpu.read_control(0), FCR0);

        fpu.write_control(31, u32::MAX);
        assert!(fpu.control.condition());
        assert_eq!(fpu.read_control(31) & Control::FIXED, Control::FIXED);
    }

    proptest! {
        #[test]
        fn results_are_never_special(a: u32, b: u32) {
            let mut fpu = Fpu::default();
            fpu.write(1, a);
            fpu.write(2, b);

            fpu.add(0, 1, 2);
            prop_assert!(f32::from_bits(fpu.read(0)).is_finite());
            fpu.mul(0, 1, 2);
            prop_assert!(f32::from_bits(fpu.read(0)).is_finite());
            fpu.div(0, 1, 2);
            prop_assert!(f32::from_bits(fpu.read(0)).is_finite());
        }

        #[test]
        fn compares(a in -1000i32..1000, b in -1000i32..1000) {
            let mut fpu = fpu_with(&[(1, a as f32), (2, b as f32)]);

            fpu.compare(Condition::LessThan, 1, 2);
            prop_assert_eq!(fpu.control.condition(), a < b);
            fpu.compare(Condition::Equal, 1, 2);
            prop_assert_eq!(fpu.control.condition(), a == b);
            fpu.compare(Condition::LessOrEqual, 1, 2);
            prop_assert_eq!(fpu.control.condition(), a <= b);
            fpu.compare(Condition::False, 1, 2);
            prop_assert!(!fpu.control.condition());
        }
    }
}
