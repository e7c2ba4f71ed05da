//! App entry point: mounts a root component into a host container.

use parking_lot::Mutex;

use super::component::Component;
use super::host::{Document, HostNode};
use super::renderer::render;
use super::vnode::{Props, VNode};
use crate::error::{Result, RippleError};

/// Where [`App::mount`] draws.
#[derive(Debug, Clone)]
pub enum MountTarget {
    Node(HostNode),
    /// Resolved with [`Document::query_selector`] at mount time.
    Selector { document: Document, selector: String },
}

impl From<HostNode> for MountTarget {
    fn from(node: HostNode) -> Self {
        MountTarget::Node(node)
    }
}

impl From<&HostNode> for MountTarget {
    fn from(node: &HostNode) -> Self {
        MountTarget::Node(node.clone())
    }
}

impl From<(&Document, &str)> for MountTarget {
    fn from((document, selector): (&Document, &str)) -> Self {
        MountTarget::Selector {
            document: document.clone(),
            selector: selector.to_string(),
        }
    }
}

/// App configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Remove the target's existing children before the first mount.
    pub clear_target: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { clear_target: true }
    }
}

/// A root component bound to at most one container.
pub struct App {
    root: Component,
    props: Props,
    config: AppConfig,
    container: Mutex<Option<HostNode>>,
}

impl App {
    pub fn new(root: Component) -> Self {
        Self {
            root,
            props: Props::new(),
            config: AppConfig::default(),
            container: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Props passed to the root component.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Mount into `target`. Later calls are no-ops once a mount succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`RippleError::MountTargetNotFound`] if a selector matches no
    /// element and [`RippleError::InvalidSelector`] if it cannot be parsed.
    pub fn mount(&self, target: impl Into<MountTarget>) -> Result<()> {
        let mut slot = self.container.lock();
        if slot.is_some() {
            tracing::debug!(root = self.root.name(), "app already mounted; ignoring mount");
            return Ok(());
        }

        let container = match target.into() {
            MountTarget::Node(node) => node,
            MountTarget::Selector { document, selector } => document
                .query_selector(&selector)?
                .ok_or(RippleError::MountTargetNotFound { selector })?,
        };

        if self.config.clear_target {
            container.clear_children();
        }
        tracing::debug!(root = self.root.name(), container = container.id(), "mounting app");

        let tree = VNode::component(&self.root, self.props.clone(), Vec::<VNode>::new());
        render(Some(&tree), &container);
        *slot = Some(container);
        Ok(())
    }

    /// Unmount from the current container, if mounted.
    pub fn unmount(&self) {
        let Some(container) = self.container.lock().take() else {
            tracing::warn!(root = self.root.name(), "unmount called on an app that is not mounted");
            return;
        };
        tracing::debug!(root = self.root.name(), container = container.id(), "unmounting app");
        render(None, &container);
    }

    pub fn is_mounted(&self) -> bool {
        self.container.lock().is_some()
    }

    pub fn container(&self) -> Option<HostNode> {
        self.container.lock().clone()
    }
}

/// Create an app for `root`.
pub fn create_app(root: Component) -> App {
    App::new(root)
}
