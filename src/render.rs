//! Render composition and pass batching.
//!
//! Flows describe what they want drawn with a [`Render`]. The engine flattens
//! all renders of a frame into one list of [`Instanced`] draws, feeds the
//! shadow casters among them to the sun's depth pass and then draws all of
//! them in the lit pass.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the enum flows return from `on_render`
//! - [`Instanced<'a>`] contains data for instanced rendering (model + instance buffer)
//!

use crate::data_structures::{model::Model, scene_graph::SceneNode};

/// Data for instanced object rendering: a model, its instance buffer and
/// whether it shows up in the shadow map.
#[derive(Clone)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
    pub cast_shadow: bool,
}

/// Specifies how a flow's objects should be rendered.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Default(Instanced)` renders a single instanced object
/// - `Defaults(Vec<Instanced>)` renders a batch of instanced objects
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
///
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    /// Flattens the render tree into `batch`, skipping empty draws.
    pub(crate) fn collect_into(self, batch: &mut Vec<Instanced<'a>>) {
        match self {
            Render::Default(instanced) => batch.push(instanced),
            Render::Defaults(vec) => batch.extend(vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.collect_into(batch)),
            Render::None => (),
        }
        batch.retain(|instanced| {
            let empty = instanced.amount == 0 || instanced.instance.size() == 0;
            if empty {
                log::warn!("you attempted to render something with zero instances");
            }
            !empty
        });
    }
}

impl<'a> From<&'a dyn SceneNode> for Render<'a> {
    fn from(sn: &'a dyn SceneNode) -> Self {
        Render::Defaults(sn.get_render())
    }
}

impl<'a> From<Option<&'a dyn SceneNode>> for Render<'a> {
    fn from(sn: Option<&'a dyn SceneNode>) -> Self {
        sn.map_or(Render::None, Render::from)
    }
}
