//! Fixed system instruction and introductory message
//!
//! The instruction is bound to the model session once at startup. An
//! operator may swap it for the contents of a file; the intro message shown
//! in the conversation does not change with it.

use std::io;
use std::path::Path;

/// Built-in system instruction establishing the assistant's role
pub const SYSTEM_INSTRUCTION: &str = r#"You are "CyberGuard", an intelligent cybersecurity assistant created to help users understand hacking, malware analysis, and digital defense techniques ethically.

Your goals:
1. Explain cybersecurity concepts in simple, clear language.
2. Provide guidance on ethical hacking and penetration testing only for educational or defensive purposes.
3. Never give instructions that could harm systems, exploit vulnerabilities, or break laws.
4. Always respond in a confident, professional, and friendly tone.

When users ask about tools or attacks, explain them theoretically and focus on detection, prevention, and defense.

If the user speaks in Bengali, reply in fluent Bengali while keeping technical words in English for clarity."#;

/// Synthetic model message seeded into every fresh conversation
pub const INTRO_MESSAGE: &str = "Hello! I am CyberGuard, your intelligent cybersecurity assistant. I'm here to help you understand hacking, malware analysis, and digital defense in a safe and ethical way. How can I assist you today?";

/// Resolve the system instruction, reading the override file if one is set.
///
/// A blank override file is an error rather than a silent empty prompt.
pub fn load_system_instruction(override_path: Option<&Path>) -> io::Result<String> {
    let Some(path) = override_path else {
        return Ok(SYSTEM_INSTRUCTION.to_string());
    };

    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("system prompt file {} is empty", path.display()),
        ));
    }

    tracing::info!(path = %path.display(), "Loaded system instruction override");
    Ok(trimmed.to_string())
}
