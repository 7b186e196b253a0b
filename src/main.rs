use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use parking_lot::Mutex;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use lunchbox::render::native::Renderer;
use lunchbox::{
    App, AppConfig, AppContext, Element, GlobalsUpdate, HeadlessRenderer, Node, Props,
    SceneRenderer, Surface, SurfaceRegistry,
};

const USAGE: &str = "Usage: lunchbox-viewer <scene.xml> [--headless] [--frames N] [--dpr X]";
const VIEWER_SURFACE: &str = "viewer";
const VIEWER_SIZE: (u32, u32) = (1280, 720);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read template {}", options.path))?;
    let template = Element::from_xml(&xml)
        .with_context(|| format!("failed to parse template {}", options.path))?;
    let template = if template.tag == "Lunchbox" {
        template
    } else {
        Element::new("Lunchbox").child(template)
    };

    if options.headless {
        return run_headless(build_app(&template, &options), options.frames);
    }
    match run_interactive(build_app(&template, &options), options.dpr) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(build_app(&template, &options), options.frames)
            } else {
                Err(err)
            }
        }
    }
}

fn build_app(template: &Element, options: &CliOptions) -> App {
    let dpr = options.dpr.unwrap_or(1.0);
    let surfaces = SurfaceRegistry::new();
    surfaces.register(
        Surface::new(VIEWER_SURFACE, VIEWER_SIZE.0, VIEWER_SIZE.1).with_pixel_ratio(dpr),
    );
    let config = AppConfig {
        dpr,
        ..AppConfig::default()
    };
    let template = template.clone();
    App::with_config(
        move |_: &AppContext, _: &Props, _: Vec<Element>| template.clone(),
        config,
    )
    .with_surfaces(surfaces)
}

fn run_headless(mut app: App, frames: u32) -> Result<()> {
    let renderer = Arc::new(Mutex::new(HeadlessRenderer::new(VIEWER_SIZE.0, VIEWER_SIZE.1)));
    app.set_renderer(renderer.clone());
    let root = app.mount(format!("#{VIEWER_SURFACE}"))?;
    print_summary(&root);

    for _ in 0..frames {
        app.tick();
    }
    {
        let renderer = renderer.lock();
        println!(
            "Rendered {} frame(s), frame id {}",
            renderer.frames_rendered(),
            app.globals().frame_id()
        );
        println!("Draw list: {} item(s)", renderer.last_draw().len());
    }
    app.unmount()?;
    Ok(())
}

/// `dpr` pins the pixel ratio; without it the window's scale factor is
/// followed.
fn run_interactive(app: App, dpr: Option<f32>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer {
        app,
        fixed_dpr: dpr,
        window: None,
        renderer: None,
        last_error: None,
    };
    event_loop.run_app(&mut viewer)?;
    viewer.shutdown();

    if let Some(err) = viewer.last_error {
        return Err(err);
    }
    Ok(())
}

struct Viewer {
    app: App,
    fixed_dpr: Option<f32>,
    window: Option<Arc<Window>>,
    renderer: Option<Arc<Mutex<Renderer>>>,
    last_error: Option<anyhow::Error>,
}

impl Viewer {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("Lunchbox Viewer")
            .with_inner_size(LogicalSize::new(VIEWER_SIZE.0 as f64, VIEWER_SIZE.1 as f64));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let renderer = Arc::new(Mutex::new(block_on(Renderer::new(Arc::clone(&window)))?));

        let size = window.inner_size().to_logical::<u32>(window.scale_factor());
        self.app.surfaces().resize(VIEWER_SURFACE, size.width, size.height);
        if self.fixed_dpr.is_none() {
            self.app
                .context()
                .update_globals(GlobalsUpdate::new().dpr(window.scale_factor() as f32));
        }
        self.app.set_renderer(renderer.clone());
        let root = self.app.mount(format!("#{VIEWER_SURFACE}"))?;
        print_summary(&root);

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.app.is_mounted() {
            println!("Rendered frame id {}", self.app.globals().frame_id());
            if let Err(err) = self.app.unmount() {
                eprintln!("Error unmounting scene: {err:?}");
            }
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.last_error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
                let size = size.to_logical::<u32>(scale);
                if let Some(renderer) = &self.renderer {
                    renderer.lock().resize(size.width, size.height);
                }
                self.app.surfaces().resize(VIEWER_SURFACE, size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if self.fixed_dpr.is_none() {
                    self.app
                        .context()
                        .update_globals(GlobalsUpdate::new().dpr(scale_factor as f32));
                }
            }
            WindowEvent::RedrawRequested => {
                if self.app.tick().is_none() {
                    info!("render loop is idle; closing viewer");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn print_summary(root: &Node) {
    println!("Mounted scene with {} nodes", root.descendants().len() - 1);
    print_nodes(root, 0);
}

fn print_nodes(node: &Node, depth: usize) {
    for child in node.children() {
        let name = child.name();
        let label = if name.is_empty() {
            child.tag()
        } else {
            format!("{} \"{name}\"", child.tag())
        };
        println!(
            "{:indent$}- {label} ({})",
            "",
            child.meta_type().label(),
            indent = depth * 2 + 1
        );
        print_nodes(&child, depth + 1);
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

struct CliOptions {
    path: String,
    headless: bool,
    frames: u32,
    dpr: Option<f32>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            path,
            headless: false,
            frames: 1,
            dpr: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => options.headless = true,
                "--frames" => {
                    let value = args.next().ok_or_else(|| anyhow!("--frames needs a value. {USAGE}"))?;
                    options.frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count `{value}`"))?;
                }
                "--dpr" => {
                    let value = args.next().ok_or_else(|| anyhow!("--dpr needs a value. {USAGE}"))?;
                    options.dpr = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid pixel ratio `{value}`"))?,
                    );
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}
