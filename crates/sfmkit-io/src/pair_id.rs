use crate::error::SfmIoError;

/// Upper bound (exclusive) for each component of a pair id, `2^31 - 1`.
pub const MAX_PAIR_COMPONENT: u64 = 2_147_483_647;

fn check_component(id: u32) -> Result<u64, SfmIoError> {
    let id = id as u64;
    if id >= MAX_PAIR_COMPONENT {
        return Err(SfmIoError::Range(format!(
            "image id {id} is not below {MAX_PAIR_COMPONENT}"
        )));
    }
    Ok(id)
}

/// Pack two image ids into a pair id.
///
/// PRECONDITION: `id_low <= id_high`. Use [`image_ids_to_pair_id`] to canonicalize an
/// unordered pair.
///
/// Example:
///
/// ```
/// use sfmkit_io::pair_id::{decode_pair_id, encode_pair_id};
///
/// let pair_id = encode_pair_id(1, 2).unwrap();
/// assert_eq!(pair_id, 2_147_483_649);
/// assert_eq!(decode_pair_id(pair_id as i64).unwrap(), (1, 2));
/// ```
pub fn encode_pair_id(id_low: u32, id_high: u32) -> Result<u64, SfmIoError> {
    let low = check_component(id_low)?;
    let high = check_component(id_high)?;
    Ok(low * MAX_PAIR_COMPONENT + high)
}

/// Pack an unordered pair of image ids, putting the smaller id first.
pub fn image_ids_to_pair_id(image_id1: u32, image_id2: u32) -> Result<u64, SfmIoError> {
    if image_id1 > image_id2 {
        encode_pair_id(image_id2, image_id1)
    } else {
        encode_pair_id(image_id1, image_id2)
    }
}

/// Unpack a pair id as stored in the database.
///
/// # Returns
///
/// The two image ids in the order they were packed.
pub fn decode_pair_id(pair_id: i64) -> Result<(u32, u32), SfmIoError> {
    let key = u64::try_from(pair_id)
        .map_err(|_| SfmIoError::Range(format!("pair id {pair_id} is negative")))?;

    let id_b = key % MAX_PAIR_COMPONENT;
    let id_a = (key - id_b) / MAX_PAIR_COMPONENT;

    if id_a >= MAX_PAIR_COMPONENT {
        return Err(SfmIoError::Range(format!(
            "pair id {pair_id} decodes to image id {id_a}, not below {MAX_PAIR_COMPONENT}"
        )));
    }

    // both components are below 2^31 - 1 here
    Ok((id_a as u32, id_b as u32))
}
