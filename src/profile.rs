use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectStatus {
    Live,
    Dev,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Live => "LIVE",
            ProjectStatus::Dev => "DEV",
            ProjectStatus::Archived => "ARCHIVED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tech: Vec<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub role: String,
    pub company: String,
    pub period: String,
    pub description: Vec<String>,
    #[serde(default)]
    pub stack: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialLinks {
    pub github: String,
    pub linkedin: String,
    pub email: String,
}

/// Static portfolio data the local source and the command table answer from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub headline: String,
    pub projects: Vec<Project>,
    pub experience: Vec<Job>,
    pub social: SocialLinks,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let profile: Profile = serde_json::from_str(&content)?;
        Ok(profile)
    }

    /// The current (first listed) job, if any.
    pub fn current_job(&self) -> Option<&Job> {
        self.experience.first()
    }
}

fn project(id: &str, title: &str, description: &str, tech: &[&str], status: ProjectStatus, link: &str) -> Project {
    Project {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        tech: tech.iter().map(|t| t.to_string()).collect(),
        status,
        link: Some(link.to_string()),
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Dhanvina".to_string(),
            headline: "Chief AI Officer and Lead AI Engineer specializing in Deep Learning, MLOps, and scalable backend architecture".to_string(),
            projects: vec![
                project(
                    "SYS_001",
                    "CtrlFake",
                    "AI-driven platform designed to detect deepfake content in videos and images. Achieved >90% accuracy using advanced deep learning architectures.",
                    &["PyTorch", "Computer Vision", "Deep Learning"],
                    ProjectStatus::Live,
                    "https://github.com/dhanvina/CtrlFake",
                ),
                project(
                    "SYS_002",
                    "MinutesAI",
                    "Automated meeting minutes generator using LangChain & Ollama. Features modular OOP architecture, multi-format output (PDF/JSON), and CLI/Streamlit interfaces.",
                    &["LangChain", "Ollama", "Streamlit"],
                    ProjectStatus::Live,
                    "https://github.com/dhanvina/MinutesAI",
                ),
                project(
                    "SYS_003",
                    "CtrlThreats",
                    "Cybersecurity solution for phishing detection and automated vulnerability scanning using NLP and ML models. Reduced manual analysis by 60%.",
                    &["NLP", "MLOps", "Scikit-learn"],
                    ProjectStatus::Live,
                    "https://github.com/dhanvina/CtrlThreats",
                ),
                project(
                    "SYS_004",
                    "SmartMark",
                    "Deep learning solution to autograde handwritten answer sheets using CNNs and OCR. Trained EfficientNet variants for character recognition.",
                    &["CNNs", "OCR", "EfficientNet"],
                    ProjectStatus::Archived,
                    "https://github.com/dhanvina/SmartMark",
                ),
                project(
                    "SYS_005",
                    "Phishing Detection",
                    "End-to-end platform using Django, Celery, and PostgreSQL. Engineered 34+ feature extraction pipeline with ensemble ML classifiers (XGBoost, Random Forest).",
                    &["Django", "XGBoost", "Docker"],
                    ProjectStatus::Live,
                    "https://github.com/dhanvina/Phishing-Detection",
                ),
            ],
            experience: vec![
                Job {
                    role: "Lead AI Engineer".to_string(),
                    company: "F9 CYBRISK Tech Company".to_string(),
                    period: "JUNE 2024 - PRESENT".to_string(),
                    description: vec![
                        "Spearheaded the design and deployment of CtrlFake, an AI-driven platform to detect deepfake content in videos/images, achieving >90% accuracy.".to_string(),
                        "Designed and directed the development of CtrlThreats, a robust cybersecurity solution for phishing detection and automated vulnerability scanning using NLP and ML models, reducing manual analysis by 60%.".to_string(),
                        "Built production-ready MLOps pipelines using Docker, MLflow, and GitHub Actions for model versioning, continuous training, and deployment.".to_string(),
                        "Developed professional YOLO MLOps pipeline for seal verification with DVC data versioning, MLflow experiment tracking, and Streamlit testing interface.".to_string(),
                        "Built end-to-end Phishing Detection platform using Django, Celery, PostgreSQL; engineered 34+ feature extraction pipeline with ensemble ML classifiers.".to_string(),
                    ],
                    stack: ["PyTorch", "MLflow", "AWS", "Docker", "YOLO", "Django", "NLP"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
                Job {
                    role: "Application Developer Intern".to_string(),
                    company: "Geekonomy".to_string(),
                    period: "APRIL 2024 - JUNE 2024".to_string(),
                    description: vec![
                        "Designed a cross-platform criminal profiling dashboard in Flutter, integrating 20+ APIs from government and criminal databases to automate case workflows.".to_string(),
                        "Optimized API data pipelines to ensure smooth synchronization and real-time updates between various law enforcement data systems.".to_string(),
                    ],
                    stack: ["Flutter", "REST APIs", "Data Pipelines", "Dart"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
            ],
            social: SocialLinks {
                github: "https://github.com/dhanvina".to_string(),
                linkedin: "https://www.linkedin.com/in/dhanvina".to_string(),
                email: "ndhanvina07@gmail.com".to_string(),
            },
        }
    }
}
