use super::ChunkResult;

pub fn assemble(results: &[ChunkResult]) -> String {
    let mut ordered: Vec<&ChunkResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.index);

    ordered
        .into_iter()
        .map(|r| r.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
