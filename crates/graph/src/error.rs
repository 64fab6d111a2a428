use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("job `{dependent}` depends on unknown job `{dependency}`")]
    UnknownJobDependency { dependent: String, dependency: String },

    #[error("job `{job}` action `{action}` references unknown template `{template}`")]
    UnknownTemplate { job: String, action: String, template: String },

    #[error("Circular dependency detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("template `{from}` setup-calls itself transitively: {}", path.join(" -> "))]
    TemplateCycle { from: String, path: Vec<String> },
}
