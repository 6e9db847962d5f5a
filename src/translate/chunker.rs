/// Split `text` into whitespace-bounded chunks of at most `max_chunk_size` characters.
///
/// Words are never split. A word longer than the limit is emitted as its own
/// chunk rather than truncated. Joining the result with single spaces gives
/// back the original word sequence; runs of whitespace collapse to one space.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let max_chunk_size = max_chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > max_chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
