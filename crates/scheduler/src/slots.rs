use crate::types::SlotId;

/// Smallest positive slot id not present in `active`.
pub fn next_slot<I>(active: I) -> SlotId
where
    I: IntoIterator<Item = SlotId>,
{
    let mut taken: Vec<SlotId> = active.into_iter().collect();
    taken.sort_unstable();
    let mut candidate = 1;
    for slot in taken {
        if slot == candidate {
            candidate += 1;
        } else if slot > candidate {
            break;
        }
    }
    candidate
}
