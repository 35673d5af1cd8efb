/// Words masked out of every chirp body.
const DENYLIST: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];

pub const MASK: &str = "****";

/// Replace denylisted words with [`MASK`].
///
/// Tokens are split on single spaces so the original spacing survives, and
/// matching is case-insensitive on the whole token: punctuation attached to
/// a word ("kerfuffle!") keeps it from matching.
pub fn mask_profanity(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            let lowered = word.to_lowercase();
            if DENYLIST.contains(&lowered.as_str()) {
                MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
