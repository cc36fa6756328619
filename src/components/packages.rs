use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, accept};
use crate::error::LinkError;
use crate::event::Property;
use crate::protocol::{Command, PackageData, TYPE_LIST_PACKAGES};
use crate::sender::CommandSender;

const NAME: &str = "packages";

/// Installed packages, replaced wholesale by every list reply.
#[derive(Debug)]
pub struct Packages {
    sender: CommandSender,
    subs: Subscriptions,
    packages: Arc<Property<Vec<PackageData>>>,
}

impl Packages {
    /// Installed packages from the last list reply.
    pub fn packages(&self) -> &Property<Vec<PackageData>> {
        &self.packages
    }

    /// Request the package list.
    pub fn list(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::packages_list())
    }
}

impl Component for Packages {
    fn create(ctx: ComponentContext) -> Self {
        let packages = Arc::new(Property::default());
        let subs = ctx.subscriptions();
        let state = Arc::clone(&packages);
        subs.on::<Vec<PackageData>>(TYPE_LIST_PACKAGES, move |resp| {
            if let Some(list) = accept(NAME, resp) {
                state.set(list.clone());
            }
        });
        Self { sender: ctx.sender().clone(), subs, packages }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&self) -> Result<(), LinkError> {
        self.list()
    }

    fn dispose(&self) {
        self.subs.clear();
    }
}
