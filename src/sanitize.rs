//! Sanitization utilities for user-controlled text.
//!
//! Applied to the opening query and every dialogue answer before they are
//! persisted in [`crate::conversation::state::ConversationState`] or embedded
//! in an LLM prompt.

/// Strip ANSI escape sequences from input.
///
/// Removes CSI sequences (`\x1b[...X`), OSC sequences (`\x1b]...\x07`),
/// and bare escape bytes. Used to prevent terminal injection when a question
/// or answer is later echoed to a terminal UI.
pub fn strip_ansi_escapes(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if bytes[i] == 0x1b {
            if i + 1 < len && bytes[i + 1] == b'[' {
                i += 2;
                while i < len && !(bytes[i] >= 0x40 && bytes[i] <= 0x7E) {
                    i += 1;
                }
                if i < len {
                    i += 1;
                }
            } else if i + 1 < len && bytes[i + 1] == b']' {
                i += 2;
                while i < len && bytes[i] != 0x07 {
                    if bytes[i] == 0x1b && i + 1 < len && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                if i < len && bytes[i] == 0x07 {
                    i += 1;
                }
            } else {
                i += 1;
                if i < len {
                    i += 1;
                }
            }
        } else {
            let ch = input[i..].chars().next().unwrap();
            result.push(ch);
            i += ch.len_utf8();
        }
    }

    result
}

/// Escape and truncate user input for safe inclusion in an LLM prompt.
///
/// - Truncates to `max_len` characters (by char count, not bytes)
/// - Replaces `<` and `>` with entities to prevent prompt-tag injection
/// - Strips control characters (U+0000-U+001F) except `\n` and `\t`
pub fn escape_for_llm_prompt(input: &str, max_len: usize) -> String {
    let truncated: String = input.chars().take(max_len).collect();
    let mut result = String::with_capacity(truncated.len());
    for ch in truncated.chars() {
        match ch {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => result.push(c),
        }
    }
    result
}

/// Sanitize a raw user query or answer prior to storing it on session state.
///
/// Combines ANSI stripping with whitespace normalization. Does not truncate —
/// length limits are enforced separately by [`crate::settings::ValidationSettings`].
pub fn sanitize_input(input: &str) -> String {
    strip_ansi_escapes(input.trim())
}
