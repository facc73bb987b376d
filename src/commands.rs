//! Keywords the terminal answers itself, without asking a response source.

use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Whoami,
    Contact,
    Clear,
}

/// Facts the command replies are filled from.
pub struct CommandContext<'a> {
    pub profile: &'a Profile,
    /// Label of the active response source.
    pub core_model: &'a str,
    /// Four-digit guest id drawn once per session.
    pub guest_id: u16,
}

impl Command {
    /// Exact keyword match after trimming, ignoring case.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "help" => Some(Command::Help),
            "status" => Some(Command::Status),
            "whoami" => Some(Command::Whoami),
            "contact" => Some(Command::Contact),
            "clear" => Some(Command::Clear),
            _ => None,
        }
    }

    /// The reply text. `Clear` has none; it resets the transcript instead.
    pub fn reply(&self, ctx: &CommandContext<'_>) -> Option<String> {
        let text = match self {
            Command::Help => "AVAILABLE COMMANDS:\n\
                 -------------------\n\
                 help        : Show this command list\n\
                 status      : Display system diagnostics & core health\n\
                 contact     : Retrieve communication channels\n\
                 whoami      : Display current session privileges\n\
                 clear       : Clear terminal output buffer\n\
                 \n\
                 > Or simply ask a question to query the Neural Engine directly."
                .to_string(),
            Command::Status => format!(
                "SYSTEM DIAGNOSTICS:\n\
                 -------------------\n\
                 CORE MODEL  : {} [OPTIMIZED]\n\
                 LATENCY     : 12ms (Nominal)\n\
                 MEMORY      : 64GB / 128GB Allocated\n\
                 ENCRYPTION  : AES-256-GCM [ACTIVE]\n\
                 MODULES     : [Vision, NLP, MLOps] ONLINE",
                ctx.core_model
            ),
            Command::Contact => format!(
                "COMMUNICATION CHANNELS:\n\
                 -------------------\n\
                 EMAIL       : {}\n\
                 LINKEDIN    : {}\n\
                 GITHUB      : {}\n\
                 MODE        : Async/Sync Available",
                ctx.profile.social.email, ctx.profile.social.linkedin, ctx.profile.social.github
            ),
            Command::Whoami => format!(
                "USER SESSION:\n\
                 -------------------\n\
                 ID          : GUEST_{:04}\n\
                 PRIVILEGE   : READ_ONLY\n\
                 ACCESS      : PUBLIC_INTERFACE\n\
                 IP_MASK     : ENABLED",
                ctx.guest_id
            ),
            Command::Clear => return None,
        };
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(profile: &Profile) -> CommandContext<'_> {
        CommandContext {
            profile,
            core_model: "Local: offline-simulation",
            guest_id: 42,
        }
    }

    #[test]
    fn test_parse_is_case_and_space_insensitive() {
        assert_eq!(Command::parse("  HeLp \n"), Some(Command::Help));
        assert_eq!(Command::parse("STATUS"), Some(Command::Status));
        assert_eq!(Command::parse("whoami"), Some(Command::Whoami));
        assert_eq!(Command::parse("\tcontact"), Some(Command::Contact));
        assert_eq!(Command::parse("Clear"), Some(Command::Clear));
    }

    #[test]
    fn test_parse_requires_exact_keyword() {
        assert_eq!(Command::parse("help me"), None);
        assert_eq!(Command::parse("contact info"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_whoami_pads_guest_id() {
        let profile = Profile::default();
        let reply = Command::Whoami.reply(&ctx(&profile)).unwrap();
        assert!(reply.contains("ID          : GUEST_0042"));
    }

    #[test]
    fn test_status_names_core_model() {
        let profile = Profile::default();
        let reply = Command::Status.reply(&ctx(&profile)).unwrap();
        assert!(reply.starts_with("SYSTEM DIAGNOSTICS:"));
        assert!(reply.contains("CORE MODEL  : Local: offline-simulation [OPTIMIZED]"));
    }

    #[test]
    fn test_contact_uses_profile_email() {
        let profile = Profile::default();
        let reply = Command::Contact.reply(&ctx(&profile)).unwrap();
        assert!(reply.contains("ndhanvina07@gmail.com"));
    }

    #[test]
    fn test_clear_has_no_reply() {
        let profile = Profile::default();
        assert!(Command::Clear.reply(&ctx(&profile)).is_none());
    }
}
