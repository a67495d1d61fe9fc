//! # Target selection
//!
//! Picks, among the measurements of one frame, the row belonging to the
//! target: the row closest to the target on the sky, accepted only when its
//! great-circle separation is within the acceptance radius.
//!
//! The same routine is used by the workers (right after extraction) and by
//! the series assembler (on the persisted records), so both stages agree on
//! what "the target" is.
//!
//! Rules
//! -----------------
//! * Separations are computed with [`angular_separation`] and compared in arcseconds.
//! * A separation exactly equal to the radius is accepted.
//! * NaN separations are never selected.
//! * Equal minimal separations resolve to the first row.
use crate::{
    constants::{ArcSec, Degree},
    conversion::angular_separation,
    frame_record::FrameRecord,
};

/// Anything carrying an ICRS sky position in degrees.
pub trait SkyPosition {
    fn ra(&self) -> Degree;
    fn dec(&self) -> Degree;
}

impl SkyPosition for FrameRecord {
    fn ra(&self) -> Degree {
        self.ra
    }

    fn dec(&self) -> Degree {
        self.dec
    }
}

impl SkyPosition for crate::target::Target {
    fn ra(&self) -> Degree {
        crate::target::Target::ra(self)
    }

    fn dec(&self) -> Degree {
        crate::target::Target::dec(self)
    }
}

/// Outcome of a target selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetMatch<'a, T> {
    /// Nearest row, within the acceptance radius
    Found { row: &'a T, separation: ArcSec },
    /// Nearest row, beyond the acceptance radius
    TooFar { row: &'a T, separation: ArcSec },
    /// No row with a defined separation
    Empty,
}

impl<'a, T> TargetMatch<'a, T> {
    /// The selected row, if it was accepted.
    pub fn accepted(&self) -> Option<&'a T> {
        match self {
            TargetMatch::Found { row, .. } => Some(*row),
            _ => None,
        }
    }
}

/// Select the row matching `target` among `rows`.
///
/// Arguments
/// -----------------
/// * `rows`: candidate measurements, in catalog order.
/// * `target`: position of the target.
/// * `max_separation`: acceptance radius in arcseconds.
///
/// Return
/// ----------
/// * [`TargetMatch::Found`] with the nearest row when within `max_separation`,
///   [`TargetMatch::TooFar`] with the nearest row otherwise, [`TargetMatch::Empty`]
///   when there is nothing to choose from.
pub fn select_target<'a, T, P>(rows: &'a [T], target: &P, max_separation: ArcSec) -> TargetMatch<'a, T>
where
    T: SkyPosition,
    P: SkyPosition + ?Sized,
{
    let (t_ra, t_dec) = (target.ra(), target.dec());

    let nearest = rows
        .iter()
        .map(|row| (row, angular_separation(t_ra, t_dec, row.ra(), row.dec())))
        .filter(|(_, separation)| !separation.is_nan())
        .reduce(|best, candidate| if candidate.1 < best.1 { candidate } else { best });

    match nearest {
        Some((row, separation)) if separation <= max_separation => {
            TargetMatch::Found { row, separation }
        }
        Some((row, separation)) => TargetMatch::TooFar { row, separation },
        None => TargetMatch::Empty,
    }
}

#[cfg(test)]
mod selection_test {
    use super::*;
    use crate::{constants::ARCSEC_PER_DEG, target::Target};

    fn row(ra: f64, dec: f64, id: &str) -> FrameRecord {
        FrameRecord {
            flux: 1.0,
            mag: 20.0,
            mag_err: 0.1,
            flux_err: 0.1,
            ra,
            dec,
            source_id: id.into(),
            date_obs: String::new(),
        }
    }

    #[test]
    fn test_nearest_is_selected() {
        let target = Target::new("t", 60.0, 0.0);
        let rows = vec![
            row(60.0 + 2.0 / ARCSEC_PER_DEG, 0.0, "far"),
            row(60.0 + 0.3 / ARCSEC_PER_DEG, 0.0, "near"),
            row(60.0, 1.0, "very far"),
        ];
        let found = select_target(&rows, &target, 0.5);
        assert_eq!(found.accepted().map(|r| r.source_id.as_str()), Some("near"));
    }

    #[test]
    fn test_too_far_reports_separation() {
        let target = Target::new("t", 60.0, 0.0);
        let rows = vec![row(60.0, 0.8 / ARCSEC_PER_DEG, "c")];
        match select_target(&rows, &target, 0.5) {
            TargetMatch::TooFar { row, separation } => {
                assert_eq!(row.source_id, "c");
                assert!((separation - 0.8).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let target = Target::new("t", 60.0, 10.0);
        let rows = vec![row(60.0, 10.0 + 0.5 / ARCSEC_PER_DEG, "edge")];
        let exact = angular_separation(60.0, 10.0, rows[0].ra, rows[0].dec);

        assert!(select_target(&rows, &target, exact).accepted().is_some());
        assert!(select_target(&rows, &target, exact - 1e-9).accepted().is_none());
    }

    #[test]
    fn test_ties_and_nan() {
        let target = Target::new("t", 60.0, 0.0);
        let rows = vec![
            row(f64::NAN, 0.0, "nan"),
            row(60.0, 0.1 / ARCSEC_PER_DEG, "first"),
            row(60.0, 0.1 / ARCSEC_PER_DEG, "second"),
        ];
        let found = select_target(&rows, &target, 0.5);
        assert_eq!(found.accepted().map(|r| r.source_id.as_str()), Some("first"));

        let only_nan = vec![row(f64::NAN, 0.0, "nan")];
        assert_eq!(select_target(&only_nan, &target, 0.5), TargetMatch::Empty);
        assert_eq!(select_target::<FrameRecord, _>(&[], &target, 0.5), TargetMatch::Empty);
    }
}
