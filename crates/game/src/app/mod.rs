mod bootstrap;
mod collaborators;
mod loop_runner;
mod maps;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
