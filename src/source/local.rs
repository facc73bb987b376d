use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;

use super::{FragmentSink, ResponseSource, SourceError};
use crate::profile::{Profile, Project};

/// Pacing of the simulated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTiming {
    /// "Thinking" pause before the first fragment.
    pub initial_delay: Duration,
    /// Characters per fragment.
    pub chunk_chars: usize,
    /// Pause between fragments.
    pub interval: Duration,
}

impl Default for LocalTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(600),
            chunk_chars: 4,
            interval: Duration::from_millis(30),
        }
    }
}

impl LocalTiming {
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            chunk_chars: 4,
            interval: Duration::ZERO,
        }
    }
}

/// Offline stand-in for the remote generator: keyword-matched canned answers
/// streamed in fixed-size chunks.
pub struct LocalSource {
    profile: Arc<Profile>,
    timing: LocalTiming,
}

impl LocalSource {
    pub fn new(profile: Arc<Profile>, timing: LocalTiming) -> Self {
        Self { profile, timing }
    }

    /// The full answer for a prompt. First matching category wins.
    pub fn reply_for(&self, prompt: &str) -> String {
        let p = prompt.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| p.contains(w));
        let profile = &self.profile;

        if has(&["who are you", "your name", "about"]) {
            return format!(
                "I am the Neural Interface for {name}'s portfolio.\n\n\
                 {name} is a {headline}. I can provide details on Projects, Experience, or Tech Stack.",
                name = profile.name,
                headline = profile.headline,
            );
        }

        if has(&["project", "build", "work"]) {
            let list: Vec<String> = profile
                .projects
                .iter()
                .map(|proj| format!("- {}: {} [{}]", proj.title, proj.description, proj.status.as_str()))
                .collect();
            return format!(
                "Accessing Project Database...\n\nHere are some key deployed systems:\n{}\n\n\
                 Would you like specific details on 'CtrlFake' or 'MinutesAI'?",
                list.join("\n")
            );
        }

        if has(&["experience", "job", "career", "company"]) {
            if let Some(job) = profile.current_job() {
                return format!(
                    "Current Role: {} at {} ({}).\n\nKey Achievements:\n{}\n\nType 'full experience' to see the complete log.",
                    job.role,
                    job.company,
                    job.period,
                    job.description.join("\n")
                );
            }
        }

        if has(&["skill", "tech", "stack", "language"]) {
            return format!(
                "Analyzing Tech Arsenal...\n\n\
                 - AI/ML Core: Python, PyTorch, TensorFlow, YOLO.\n\
                 - GenAI: LangChain, Ollama, Gemini.\n\
                 - Backend: Django, FastAPI, Docker.\n\
                 - Cloud: AWS, GCP, Azure.\n\n\
                 {} specializes in end-to-end MLOps pipelines.",
                profile.name
            );
        }

        if has(&["contact", "email", "hire", "linkedin"]) {
            return format!(
                "Communication Channels Open:\n\n- LinkedIn: {}\n- Email: {}\n- GitHub: {}\n\n\
                 Priority is given to professional inquiries via LinkedIn.",
                profile.social.linkedin, profile.social.email, profile.social.github
            );
        }

        if p.contains("ctrlfake") {
            return "CtrlFake is a Deepfake Detection platform achieving >90% accuracy using PyTorch and Computer Vision techniques.".to_string();
        }
        if p.contains("minutesai") {
            return "MinutesAI automates meeting documentation using LangChain and Ollama, offering modular output formats (PDF/JSON).".to_string();
        }
        if p.contains("ctrlthreats") {
            return "CtrlThreats utilizes NLP for cybersecurity threat detection, reducing manual review time by 60%.".to_string();
        }
        if let Some(proj) = profile.projects.iter().find(|proj| p.contains(&proj.title.to_lowercase())) {
            return project_card(proj);
        }

        format!(
            "Command not recognized by local index.\n\n\
             Try asking about:\n- \"Projects\"\n- \"Experience\"\n- \"Tech Stack\"\n- \"Contact Info\"\n- \"About {}\"\n\n\
             System is running in Offline Simulation Mode.",
            profile.name
        )
    }
}

/// Split `text` into pieces of at most `size` characters, never inside a
/// UTF-8 sequence.
pub fn chunk_chars(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[async_trait]
impl ResponseSource for LocalSource {
    fn label(&self) -> String {
        "Local: offline-simulation".to_string()
    }

    async fn produce(&self, prompt: &str, sink: &mut dyn FragmentSink) -> Result<(), SourceError> {
        tokio::time::sleep(self.timing.initial_delay).await;

        let reply = self.reply_for(prompt);
        let chunks = chunk_chars(&reply, self.timing.chunk_chars);
        debug!(chars = reply.chars().count(), fragments = chunks.len(), "streaming local reply");

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.timing.interval).await;
            }
            sink.append(chunk);
        }
        Ok(())
    }
}

/// Detail view of one configured project.
fn project_card(proj: &Project) -> String {
    let mut card = format!(
        "Retrieving {} [{}]...\n\n{}\n\nStatus: {}\nStack: {}",
        proj.title,
        proj.id,
        proj.description,
        proj.status.as_str(),
        proj.tech.join(", ")
    );
    if let Some(link) = &proj.link {
        card.push_str(&format!("\nSource: {}", link));
    }
    card
}
