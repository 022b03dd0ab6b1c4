use crate::bus::Bus;

/// Builds index lists for each type of bus (REF, PV, PQ).
///
/// Lists follow the current role of each bus, so PV buses that were
/// converted after hitting a reactive limit are returned as PQ.
pub fn bus_types(bus: &[Bus]) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let refbus = bus
        .iter()
        .filter(|b| b.is_ref())
        .map(|b| b.i)
        .collect::<Vec<usize>>();
    let pv = bus
        .iter()
        .filter(|b| b.is_pv())
        .map(|b| b.i)
        .collect::<Vec<usize>>();
    let pq = bus
        .iter()
        .filter(|b| b.is_pq())
        .map(|b| b.i)
        .collect::<Vec<usize>>();

    (refbus, pv, pq)
}
