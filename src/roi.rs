//! Region-of-interest sample extraction.
//!
//! Values come from the initially filtered recording, never from the smoothed
//! signal, so peak accelerations are not attenuated by conditioning.

use crate::detect::Attempts;
use crate::recording::Recording;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiSample {
    /// Position of the owning region within [`Attempts`].
    pub region: usize,
    /// Row in the recording as originally loaded.
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Copies the three axes for every index of every region, in region order.
///
/// Overlapping regions each receive their own copy of shared samples.
pub fn extract_roi_values(recording: &Recording, attempts: &Attempts) -> Vec<RoiSample> {
    let samples = recording.samples();
    let mut out = Vec::new();
    for (region_idx, region) in attempts.regions().iter().enumerate() {
        assert!(
            region.end <= samples.len(),
            "region {}..{} exceeds recording of {} samples",
            region.start,
            region.end,
            samples.len()
        );
        out.extend(region.indices().map(|i| {
            let s = &samples[i];
            RoiSample {
                region: region_idx,
                index: recording.offset() + i,
                x: s.x,
                y: s.y,
                z: s.z,
            }
        }));
    }
    debug!("Extracted {} ROI samples from {} regions", out.len(), attempts.len());
    out
}
