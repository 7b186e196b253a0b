use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::app::AppConfig;
use crate::context::AppContext;
use crate::element::{Element, PropValue, Props};
use crate::graph::Value;

/// Declarative building block expanded before elements reach the node
/// operations.
pub trait Component: Send + Sync {
    fn render(&self, cx: &AppContext, props: &Props, children: Vec<Element>) -> Element;
}

impl<F> Component for F
where
    F: Fn(&AppContext, &Props, Vec<Element>) -> Element + Send + Sync,
{
    fn render(&self, cx: &AppContext, props: &Props, children: Vec<Element>) -> Element {
        self(cx, props, children)
    }
}

/// Tags that get a pass-through component in every app.
pub const AUTO_GENERATED_COMPONENTS: &[&str] = &[
    "scene",
    "group",
    "mesh",
    "perspectiveCamera",
    "orthographicCamera",
    "ambientLight",
    "directionalLight",
    "pointLight",
    "boxGeometry",
    "sphereGeometry",
    "planeGeometry",
    "meshBasicMaterial",
    "meshStandardMaterial",
    "texture",
    "fog",
];

/// Renders a host element with the same tag, forwarding props and children.
#[derive(Debug, Clone, PartialEq)]
pub struct PassThrough {
    tag: String,
}

impl PassThrough {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Component for PassThrough {
    fn render(&self, _cx: &AppContext, props: &Props, children: Vec<Element>) -> Element {
        Element::host(self.tag.clone(), props.clone(), children)
    }
}

/// The `Lunchbox` component: wraps its children in a scene and adds a
/// camera when none of them is one.
///
/// Recognised props: `background`, `cameraPosition`, `cameraFov` and
/// `ortho`.
#[derive(Debug, Clone, PartialEq)]
pub struct LunchboxWrapper {
    config: AppConfig,
}

impl LunchboxWrapper {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn default_camera(&self, props: &Props) -> Element {
        let value = |key: &str| props.get(key).and_then(PropValue::as_value).cloned();
        let ortho = value("ortho").and_then(|v| v.as_bool()).unwrap_or(false);
        let position = value("cameraPosition")
            .and_then(|v| v.as_vec3())
            .unwrap_or(self.config.camera_position);

        let mut camera_props = Props::new();
        camera_props.insert("position".into(), PropValue::Value(Value::Vec3(position)));
        if ortho {
            return Element::host("orthographicCamera", camera_props, Vec::new());
        }
        let fov = value("cameraFov")
            .and_then(|v| v.as_number())
            .unwrap_or(self.config.camera_fov);
        camera_props.insert("fov".into(), PropValue::Value(Value::Number(fov)));
        Element::host("perspectiveCamera", camera_props, Vec::new())
    }
}

impl Default for LunchboxWrapper {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

fn has_camera(element: &Element) -> bool {
    element.tag.ends_with("Camera") || element.children.iter().any(has_camera)
}

impl Component for LunchboxWrapper {
    fn render(&self, _cx: &AppContext, props: &Props, children: Vec<Element>) -> Element {
        let mut scene_props = Props::new();
        let background = props
            .get("background")
            .cloned()
            .or_else(|| self.config.background.map(|c| PropValue::Value(Value::Color(c))));
        if let Some(background) = background {
            scene_props.insert("background".into(), background);
        }

        let mut children = children;
        if self.config.default_camera && !children.iter().any(has_camera) {
            children.insert(0, self.default_camera(props));
        }
        Element::host("scene", scene_props, children)
    }
}

/// Component namespace of one app. Clones share the same table.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: Arc<RwLock<HashMap<String, Arc<dyn Component>>>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, component: Arc<dyn Component>) {
        self.components.write().insert(name.into(), component);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.components.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Every component an app registers on creation.
pub fn catalogue(config: &AppConfig) -> Vec<(String, Arc<dyn Component>)> {
    let mut components: Vec<(String, Arc<dyn Component>)> = AUTO_GENERATED_COMPONENTS
        .iter()
        .map(|tag| {
            let component: Arc<dyn Component> = Arc::new(PassThrough::new(*tag));
            (tag.to_string(), component)
        })
        .collect();
    components.push((
        "Lunchbox".to_string(),
        Arc::new(LunchboxWrapper::new(config.clone())),
    ));
    components
}

/// Default camera position used when no config overrides it.
pub(crate) const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 10.0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::Globals;
    use crate::graph::builtin_classes;
    use crate::interactables::Interactables;
    use crate::render_loop::RenderLoop;

    fn cx() -> AppContext {
        AppContext::new(RenderLoop::new(Globals::new()), Interactables::new())
    }

    #[test]
    fn auto_generated_tags_match_builtin_classes() {
        let classes: Vec<String> = builtin_classes()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        for tag in AUTO_GENERATED_COMPONENTS {
            assert!(classes.iter().any(|c| c == tag), "{tag}");
        }
    }

    #[test]
    fn pass_through_forwards_props_and_children() {
        let props: Props = [("visible".to_string(), PropValue::from(false))].into();
        let rendered = PassThrough::new("mesh").render(&cx(), &props, vec![Element::new("boxGeometry")]);
        assert!(rendered.is_host());
        assert_eq!(rendered.tag, "mesh");
        assert_eq!(rendered.props, props);
        assert_eq!(rendered.children.len(), 1);
    }

    #[test]
    fn wrapper_adds_camera_only_when_missing() {
        let wrapper = LunchboxWrapper::default();
        let scene = wrapper.render(&cx(), &Props::new(), vec![Element::new("mesh")]);
        assert_eq!(scene.tag, "scene");
        assert_eq!(scene.children[0].tag, "perspectiveCamera");
        assert_eq!(scene.children.len(), 2);

        let nested = Element::new("group").child(Element::new("orthographicCamera"));
        let scene = wrapper.render(&cx(), &Props::new(), vec![nested]);
        assert_eq!(scene.children.len(), 1);
    }

    #[test]
    fn wrapper_forwards_background_and_camera_props() {
        let wrapper = LunchboxWrapper::default();
        let props: Props = [
            ("background".to_string(), PropValue::from("#ff0000")),
            ("cameraPosition".to_string(), PropValue::from(Vec3::new(1.0, 2.0, 3.0))),
            ("ortho".to_string(), PropValue::from(true)),
        ]
        .into();
        let scene = wrapper.render(&cx(), &props, Vec::new());
        assert_eq!(
            scene.props.get("background"),
            Some(&PropValue::Value(Value::Color(Vec3::X)))
        );
        let camera = &scene.children[0];
        assert_eq!(camera.tag, "orthographicCamera");
        assert_eq!(
            camera.props.get("position"),
            Some(&PropValue::Value(Value::Vec3(Vec3::new(1.0, 2.0, 3.0))))
        );
    }

    #[test]
    fn catalogue_registers_wrapper_and_every_tag() {
        let registry = ComponentRegistry::new();
        for (name, component) in catalogue(&AppConfig::default()) {
            registry.register(name, component);
        }
        assert_eq!(registry.len(), AUTO_GENERATED_COMPONENTS.len() + 1);
        assert!(registry.contains("Lunchbox"));
        assert!(registry.contains("meshBasicMaterial"));
    }

    #[test]
    fn closures_are_components() {
        let component = |_: &AppContext, _: &Props, children: Vec<Element>| {
            Element::new("group").with_children(children)
        };
        let rendered = component.render(&cx(), &Props::new(), vec![Element::new("mesh")]);
        assert_eq!(rendered.children.len(), 1);
    }
}
