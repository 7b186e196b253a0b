use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node as XmlNode};

use crate::graph::Value;
use crate::interactables::{event_key, EventHandler, InteractionEvent};

/// Value bound to a prop key: either a property value or an event handler.
#[derive(Debug, Clone)]
pub enum PropValue {
    Value(Value),
    Handler(EventHandler),
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PropValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Handler(_) => None,
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        Self::Handler(handler)
    }
}

impl From<f32> for PropValue {
    fn from(value: f32) -> Self {
        Self::Value(Value::Number(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<Vec3> for PropValue {
    fn from(value: Vec3) -> Self {
        Self::Value(Value::Vec3(value))
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::parse(value))
    }
}

pub type Props = BTreeMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Resolved through the component namespace when a component with the
    /// same name exists, otherwise treated as a host tag.
    Component,
    /// Handed to the node operations as is.
    Host,
    Text(String),
    Comment(String),
}

/// Declarative description of one tree entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub kind: ElementKind,
    pub props: Props,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: ElementKind::Component,
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn host(tag: impl Into<String>, props: Props, children: Vec<Element>) -> Self {
        Self {
            tag: tag.into(),
            kind: ElementKind::Host,
            props,
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            tag: "text".to_string(),
            kind: ElementKind::Text(text.into()),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            tag: "comment".to_string(),
            kind: ElementKind::Comment(text.into()),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Binds `handler` to the event `name` (`click` binds `onClick`).
    pub fn on<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&InteractionEvent) + Send + Sync + 'static,
    {
        self.prop(event_key(name), EventHandler::new(handler))
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, ElementKind::Host)
    }

    /// Constructor arguments taken from the reserved `args` prop.
    pub fn args(&self) -> Vec<Value> {
        self.props
            .get("args")
            .and_then(PropValue::as_value)
            .map(Value::to_args)
            .unwrap_or_default()
    }

    /// Number of elements in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Element::count).sum::<usize>()
    }

    /// Parses an XML template. Attribute values go through [`Value::parse`];
    /// non-blank text content becomes text children.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid template XML")?;
        let root = document.root_element();
        convert(&root).ok_or_else(|| anyhow!("template has no root element"))
    }
}

fn convert(node: &XmlNode<'_, '_>) -> Option<Element> {
    if node.is_text() {
        let text = node.text()?.trim();
        return (!text.is_empty()).then(|| Element::text(text));
    }
    if !node.is_element() {
        return None;
    }
    let mut element = Element::new(node.tag_name().name());
    for attribute in node.attributes() {
        element
            .props
            .insert(attribute.name().to_string(), PropValue::Value(Value::parse(attribute.value())));
    }
    element.children = node.children().filter_map(|child| convert(&child)).collect();
    Some(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
    <Lunchbox background="#000000">
        <mesh name="cube" position="0 1 0" rotation-y="0.5">
            <boxGeometry args="1 2 3" />
            <meshBasicMaterial color="#00ff00" />
        </mesh>
        <!-- ignored -->
    </Lunchbox>
    "##;

    #[test]
    fn from_xml_builds_the_element_tree() {
        let template = Element::from_xml(SAMPLE).unwrap();
        assert_eq!(template.tag, "Lunchbox");
        assert_eq!(template.count(), 4);
        let mesh = &template.children[0];
        assert_eq!(
            mesh.props.get("position"),
            Some(&PropValue::Value(Value::Vec3(Vec3::new(0.0, 1.0, 0.0))))
        );
        assert_eq!(
            mesh.props.get("rotation-y"),
            Some(&PropValue::Value(Value::Number(0.5)))
        );
        assert_eq!(mesh.children[0].args().len(), 3);
    }

    #[test]
    fn from_xml_reports_malformed_input() {
        assert!(Element::from_xml("<mesh>").is_err());
    }

    #[test]
    fn handler_props_compare_by_identity() {
        let handler = EventHandler::new(|_| {});
        let a = PropValue::Handler(handler.clone());
        let b = PropValue::Handler(handler);
        let c = PropValue::Handler(EventHandler::new(|_| {}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
