/// Fresh random identifier in UUID v4 text form.
#[must_use]
pub(crate) fn new_id() -> String {
    let seed_hi = u128::from(fastrand::u64(..));
    let seed_lo = u128::from(fastrand::u64(..));
    let bytes = ((seed_hi << 64) | seed_lo).to_be_bytes();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}
