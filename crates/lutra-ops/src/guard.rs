//! Scoped overrides of operator state.
//!
//! The fast-LUT builder needs the source LUT to evaluate with exact
//! inversion while it renders the approximation, then put the caller's
//! setting back whatever happens. The guard owns the borrow for the whole
//! scope and restores the previous value on drop, so every exit path
//! (including early returns on error) releases correctly.

use crate::lut1d::{InversionQuality, Lut1DOp};

/// Forces a LUT to exact inversion for the guard's lifetime.
///
/// # Example
///
/// ```rust,ignore
/// let guard = ExactInversionGuard::new(&mut lut);
/// compose(&mut domain, guard.lut(), ComposeMethod::ResampleNo)?;
/// // dropping the guard restores the previous quality
/// ```
pub struct ExactInversionGuard<'a> {
    lut: &'a mut Lut1DOp,
    previous: InversionQuality,
}

impl<'a> ExactInversionGuard<'a> {
    /// Switches `lut` to exact inversion, remembering the current setting.
    pub fn new(lut: &'a mut Lut1DOp) -> Self {
        let previous = lut.inversion_quality();
        lut.set_inversion_quality(InversionQuality::Exact);
        Self { lut, previous }
    }

    /// The guarded LUT.
    pub fn lut(&self) -> &Lut1DOp {
        self.lut
    }
}

impl Drop for ExactInversionGuard<'_> {
    fn drop(&mut self) {
        self.lut.set_inversion_quality(self.previous);
    }
}
