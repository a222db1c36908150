#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use arbor::{Behaviour, Context, Node, Status};

pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

/// Returns `script` in order, repeating the last entry, and records every
/// lifecycle call as `name:phase`.
pub struct Scripted {
    name: &'static str,
    script: Vec<Status>,
    next: usize,
    journal: Journal,
}

impl Scripted {
    pub fn new(name: &'static str, script: &[Status], journal: &Journal) -> Self {
        Self {
            name,
            script: script.to_vec(),
            next: 0,
            journal: journal.clone(),
        }
    }
}

impl Behaviour for Scripted {
    fn initialise(&mut self, _ctx: &mut Context<'_>) {
        self.journal
            .borrow_mut()
            .push(format!("{}:initialise", self.name));
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        self.journal.borrow_mut().push(format!("{}:update", self.name));
        let index = self.next.min(self.script.len() - 1);
        self.next += 1;
        self.script[index]
    }

    fn terminate(&mut self, new_status: Status, _ctx: &mut Context<'_>) {
        self.journal
            .borrow_mut()
            .push(format!("{}:terminate({new_status})", self.name));
    }
}

pub fn scripted(name: &'static str, script: &[Status], journal: &Journal) -> Node {
    Node::leaf(name, Scripted::new(name, script, journal))
}

pub fn entries(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .borrow()
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .cloned()
        .collect()
}
