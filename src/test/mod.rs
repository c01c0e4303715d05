use std::sync::Arc;

use crate::component::Registry;
use crate::core::{Message, MessageKind};
use crate::demo::{HydraulicLine, LineOpts, build_hydraulic_line};
use crate::library::register_default_library;
use crate::system::Model;

mod components;
mod connect;
mod lifecycle;
mod logging;
mod lookup;
mod messages;
mod parallel;
mod scenario;
mod sort;

fn registry() -> Registry {
    let mut registry = Registry::new();
    register_default_library(&mut registry).expect("register default library");
    registry
}

fn new_model(name: &str) -> Model {
    Model::new(name, Arc::new(registry()))
}

fn hydraulic_line(opts: &LineOpts) -> (Model, HydraulicLine) {
    let mut model = new_model("Line");
    let line = build_hydraulic_line(&mut model, opts).expect("build hydraulic line");
    (model, line)
}

fn drain_of(model: &Model, kind: MessageKind) -> Vec<Message> {
    model
        .messages()
        .drain()
        .into_iter()
        .filter(|m| m.kind == kind)
        .collect()
}

fn has_message(messages: &[Message], needle: &str) -> bool {
    messages.iter().any(|m| m.text.contains(needle))
}
