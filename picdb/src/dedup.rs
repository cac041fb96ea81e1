//! Identifier uniqueness and content-duplicate resolution.
//!
//! Invoked by `insert` once the candidate row has `pict_id`, `sha`, and
//! `size[Orig]` populated, but before any blob write.

use crate::error::{Error, Result};
use crate::layout::Variant;
use crate::table::MetadataTable;

/// Runs the dedup scan for the candidate row at `index`.
///
/// On success, `table.get(index).offset[Orig]` is non-zero iff the
/// candidate's content was already present under another id — the
/// caller should then skip decoding/appending the original blob.
///
/// A `pict_id` collision short-circuits the scan immediately. No sha-copy
/// happens once a collision is found, even if a later row would also
/// match by content.
pub fn resolve(table: &mut MetadataTable, index: usize) -> Result<()> {
    table.get_mut(index).offset[Variant::Orig.index()] = 0;

    let id = table.get(index).pict_id.clone();
    let sha = table.get(index).sha;

    for i in 0..table.len() {
        if i == index || !table.get(i).is_occupied() {
            continue;
        }
        if table.get(i).pict_id == id {
            return Err(Error::DuplicateId(id));
        }
        if table.get(i).sha == sha {
            let source = table.get(i).clone();
            let candidate = table.get_mut(index);
            candidate.size[Variant::Thumb.index()] = source.size[Variant::Thumb.index()];
            candidate.size[Variant::Small.index()] = source.size[Variant::Small.index()];
            candidate.offset[Variant::Orig.index()] = source.offset[Variant::Orig.index()];
            candidate.offset[Variant::Thumb.index()] = source.offset[Variant::Thumb.index()];
            candidate.offset[Variant::Small.index()] = source.offset[Variant::Small.index()];
            candidate.res_orig = source.res_orig;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Row, Validity};

    fn row(id: &str, sha: [u8; 32]) -> Row {
        let mut r = Row::empty();
        r.pict_id = id.to_owned();
        r.sha = sha;
        r.is_valid = Validity::NonEmpty;
        r
    }

    #[test]
    fn distinct_content_leaves_offset_zero() {
        let mut t = MetadataTable::empty(3).expect("alloc");
        *t.get_mut(0) = row("a", [1; 32]);
        *t.get_mut(1) = row("b", [2; 32]);
        resolve(&mut t, 1).expect("resolve");
        assert_eq!(t.get(1).offset[Variant::Orig.index()], 0);
    }

    #[test]
    fn duplicate_id_short_circuits_without_copying_offsets() {
        let mut t = MetadataTable::empty(3).expect("alloc");
        *t.get_mut(0) = {
            let mut r = row("dup", [9; 32]);
            r.offset[Variant::Orig.index()] = 500;
            r
        };
        *t.get_mut(1) = row("dup", [9; 32]);
        let err = resolve(&mut t, 1).expect_err("must fail");
        assert!(matches!(err, Error::DuplicateId(_)));
        assert_eq!(t.get(1).offset[Variant::Orig.index()], 0);
    }

    #[test]
    fn shared_content_copies_offsets_from_last_match_in_scan_order() {
        let mut t = MetadataTable::empty(4).expect("alloc");
        *t.get_mut(0) = {
            let mut r = row("a", [9; 32]);
            r.offset[Variant::Orig.index()] = 111;
            r
        };
        *t.get_mut(2) = {
            let mut r = row("b", [9; 32]);
            r.offset[Variant::Orig.index()] = 222;
            r
        };
        *t.get_mut(3) = row("c", [9; 32]);
        resolve(&mut t, 3).expect("resolve");
        // ascending scan order visits index 0 then 2; index 2 wins (last match).
        assert_eq!(t.get(3).offset[Variant::Orig.index()], 222);
    }
}
