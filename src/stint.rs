use crate::data::Lap;

/// The laps one driver ran on a single stint id, ascending by lap number.
#[derive(Debug, Clone)]
pub struct Stint<'a> {
    pub id: u32,
    pub laps: Vec<&'a Lap>,
}

impl<'a> Stint<'a> {
    /// Total laps in the stint, valid or not.
    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    pub fn first_lap_number(&self) -> Option<u32> {
        self.laps.first().map(|l| l.lap_number)
    }
}

/// Splits a driver's laps into stints, in the order each stint id first appears.
/// An empty lap table gives no stints.
pub fn segment_stints<'a>(laps: &[&'a Lap]) -> Vec<Stint<'a>> {
    let mut stints: Vec<Stint<'a>> = Vec::new();

    for &lap in laps {
        match stints.iter_mut().find(|s| s.id == lap.stint) {
            Some(stint) => stint.laps.push(lap),
            None => stints.push(Stint { id: lap.stint, laps: vec![lap] }),
        }
    }

    for stint in &mut stints {
        stint.laps.sort_by_key(|l| l.lap_number);
    }
    stints
}
