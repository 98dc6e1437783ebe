//! Boilerplate generators for arithmetic on single-field newtypes.

/// Implements an operator trait for a tuple newtype by delegating to the wrapped value.
///
/// * `op!(binary Cents, Add, add)` implements `Add<Cents> for Cents`
/// * `op!(inplace Cents, AddAssign, add_assign)` implements `AddAssign<Cents> for Cents`
/// * `op!(unary Cents, Neg, neg)` implements `Neg for Cents`
#[macro_export]
macro_rules! op {
    (binary $unit:ty, $trt:ident, $fn_name:ident) => {
        impl $trt for $unit {
            type Output = Self;

            fn $fn_name(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn_name(rhs.0))
            }
        }
    };
    (inplace $unit:ty, $trt:ident, $fn_name:ident) => {
        impl $trt for $unit {
            fn $fn_name(&mut self, rhs: Self) {
                self.0.$fn_name(rhs.0)
            }
        }
    };
    (unary $unit:ty, $trt:ident, $fn_name:ident) => {
        impl $trt for $unit {
            type Output = Self;

            fn $fn_name(self) -> Self::Output {
                Self(self.0.$fn_name())
            }
        }
    };
}
