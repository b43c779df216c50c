//! Deterministic splitting of a reply into synthesis-sized chunks.
//!
//! Sentences end at `.`, `!` or `?`. A sentence longer than the limit is
//! broken at clause marks (`,` `;` `:`), and a clause that is still too long
//! is packed word by word. The same input always yields the same chunks.

/// Default upper bound on characters per chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 120;

const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];
const CLAUSE_BREAKS: [char; 3] = [',', ';', ':'];

/// Split `text` into ordered chunks of at most `max_chunk_chars` characters.
///
/// A single word longer than the limit is kept whole rather than cut.
/// Whitespace-only input yields no chunks.
pub fn split_reply(text: &str, max_chunk_chars: usize) -> Vec<String> {
    let max_chunk_chars = max_chunk_chars.max(1);
    let mut chunks = Vec::new();

    for sentence in split_inclusive_on(text, &SENTENCE_ENDINGS) {
        if char_len(&sentence) <= max_chunk_chars {
            chunks.push(sentence);
            continue;
        }

        let clauses = split_inclusive_on(&sentence, &CLAUSE_BREAKS);
        let mut pieces = Vec::new();
        for clause in clauses {
            if char_len(&clause) <= max_chunk_chars {
                pieces.push(clause);
            } else {
                pieces.extend(pack_words(clause.split_whitespace(), max_chunk_chars));
            }
        }
        chunks.extend(pack_pieces(pieces, max_chunk_chars));
    }

    chunks
}

/// Split after every run of `delimiters`, trimming and dropping empty pieces.
fn split_inclusive_on(text: &str, delimiters: &[char]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if delimiters.contains(&c) {
            // "?!" and "..." stay attached to the piece they end
            while let Some(&next) = chars.peek() {
                if !delimiters.contains(&next) {
                    break;
                }
                current.push(next);
                chars.next();
            }
            push_trimmed(&mut pieces, &current);
            current.clear();
        }
    }
    push_trimmed(&mut pieces, &current);

    pieces
}

/// Greedily join whole words into lines no longer than `max`.
fn pack_words<'a>(words: impl Iterator<Item = &'a str>, max: usize) -> Vec<String> {
    pack(words.map(str::to_string), max)
}

/// Greedily join clauses back together while they still fit.
fn pack_pieces(pieces: Vec<String>, max: usize) -> Vec<String> {
    pack(pieces.into_iter(), max)
}

fn pack(items: impl Iterator<Item = String>, max: usize) -> Vec<String> {
    let mut packed = Vec::new();
    let mut current = String::new();

    for item in items {
        if current.is_empty() {
            current = item;
        } else if char_len(&current) + 1 + char_len(&item) <= max {
            current.push(' ');
            current.push_str(&item);
        } else {
            packed.push(std::mem::take(&mut current));
            current = item;
        }
    }
    if !current.is_empty() {
        packed.push(current);
    }

    packed
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
