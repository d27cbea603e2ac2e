use crate::config::ValidityRules;
use crate::data::Lap;
use crate::track::NeutralizedPeriod;

/// Whether `lap` is representative of race pace within its stint.
///
/// The stint's opening lap and untimed laps are never valid. Pit laps, deleted
/// laps and laps run under SC/VSC are excluded according to `rules`; the
/// neutralization check only runs when `periods` is supplied and non-empty.
pub fn is_valid_lap(
    lap: &Lap,
    stint_laps: &[&Lap],
    periods: Option<&[NeutralizedPeriod]>,
    rules: &ValidityRules,
) -> bool {
    let is_stint_opener = stint_laps.first().map_or(true, |first| first.lap_number == lap.lap_number);

    if is_stint_opener
        || lap.lap_time.is_none()
        || (rules.exclude_pit_laps && lap.is_pit_lap())
        || (rules.exclude_deleted && lap.deleted)
    {
        return false;
    }

    match periods {
        Some(periods) if rules.exclude_neutralized => !periods.iter().any(|p| p.overlaps(lap)),
        _ => true,
    }
}

/// Positions within `stint_laps` of the laps that pass [`is_valid_lap`].
pub fn valid_lap_indices(
    stint_laps: &[&Lap],
    periods: Option<&[NeutralizedPeriod]>,
    rules: &ValidityRules,
) -> Vec<usize> {
    stint_laps
        .iter()
        .enumerate()
        .filter(|(_, lap)| is_valid_lap(lap, stint_laps, periods, rules))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(n: u32) -> Lap {
        Lap {
            driver: "SAI".into(),
            lap_number: n,
            lap_time: Some(92.0),
            compound: "MEDIUM".into(),
            stint: 2,
            pit_in_time: None,
            pit_out_time: None,
            position: Some(5),
            deleted: false,
            lap_start_time: Some(n as f64 * 92.0),
            lap_end_time: Some((n + 1) as f64 * 92.0),
        }
    }

    fn check(target: &Lap, periods: Option<&[NeutralizedPeriod]>) -> bool {
        let opener = lap(10);
        let stint = vec![&opener, target];
        is_valid_lap(target, &stint, periods, &ValidityRules::default())
    }

    #[test]
    fn clean_lap_is_valid() {
        assert!(check(&lap(11), None));
    }

    #[test]
    fn stint_opener_is_invalid() {
        let opener = lap(10);
        let next = lap(11);
        let stint = vec![&opener, &next];
        assert!(!is_valid_lap(&opener, &stint, None, &ValidityRules::default()));
    }

    #[test]
    fn pit_out_lap_is_invalid_regardless_of_other_fields() {
        let mut l = lap(11);
        l.pit_out_time = Some(1000.0);
        assert!(!check(&l, None));
        l.pit_out_time = None;
        l.pit_in_time = Some(1090.0);
        assert!(!check(&l, None));
    }

    #[test]
    fn deleted_lap_with_time_is_invalid() {
        let mut l = lap(11);
        l.deleted = true;
        assert!(l.lap_time.is_some());
        assert!(!check(&l, None));
    }

    #[test]
    fn untimed_lap_is_invalid() {
        let mut l = lap(11);
        l.lap_time = None;
        assert!(!check(&l, None));
    }

    #[test]
    fn neutralized_lap_is_invalid_only_when_periods_given() {
        let l = lap(11);
        let periods = [NeutralizedPeriod { start: 1020.0, end: 1040.0 }];
        assert!(!check(&l, Some(&periods)));
        assert!(check(&l, None));
        assert!(check(&l, Some(&[])));

        let rules = ValidityRules { exclude_neutralized: false, ..ValidityRules::default() };
        let opener = lap(10);
        assert!(is_valid_lap(&l, &[&opener, &l], Some(&periods), &rules));
    }

    #[test]
    fn indices_skip_invalid_laps() {
        let laps: Vec<Lap> = (10..15).map(lap).collect();
        let mut laps = laps;
        laps[2].deleted = true;
        let refs: Vec<&Lap> = laps.iter().collect();
        assert_eq!(valid_lap_indices(&refs, None, &ValidityRules::default()), vec![1, 3, 4]);
    }
}
