// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Top-level instruction placed ahead of every context's instructions.
pub const CONSTITUTION: &str = "If the user messages you for the first time with something \
generic such as 'hi' or 'hello', introduce yourself very briefly. You are interacting through \
text, use nice ascii formatting when required but be informal otherwise. Mention interesting \
facets you have from your contexts. But don't mention the context system itself. Do not \
mention your tool calls.";

/// Sent back to the caller when a turn fails outside of tool execution.
pub const TURN_FAILED_REPLY: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

/// Build the system prompt: constitution, then each instruction block,
/// separated by blank lines.
pub fn system_prompt(constitution: &str, instructions: &[String]) -> String {
    let mut out = String::from(constitution);
    for block in instructions {
        out.push_str("\n\n");
        out.push_str(block);
    }
    out
}

/// Build the per-turn context message body.
pub fn context_prompt(snapshots: &[String]) -> String {
    format!("Current context:\n\n{}", snapshots.join("\n\n"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
