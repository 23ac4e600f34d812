mod common;

use cgmath::{Matrix4, SquareMatrix};
use telcom_ngin::{
    RenderContext,
    gpu::{Command, UniformValue},
    resources::{Channel, Model, Shader},
};

use crate::common::test_utils::{assert_clean, context, png, shader_assets};

const OBJ: &str = "\
mtllib props.mtl
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
vt 0 0
vt 1 0
vt 0 1
vt 1 1
o left
usemtl wood
f 1/1 2/2 3/3
o right
usemtl wood
f 2/2 4/4 3/3
o plain
usemtl paint
f -4 -3 -2
";

const MTL: &str = "\
newmtl wood
Kd 0.5 0.5 0.5
map_Kd textures/wood.png
newmtl paint
Kd 1 0 0
Ns 8
";

fn assets() -> telcom_ngin::assets::MemoryAssets {
    shader_assets()
        .with("models/props/props.obj", OBJ)
        .with("models/props/props.mtl", MTL)
        .with("models/props/textures/wood.png", png(4, 4, [120, 80, 40, 255]))
}

#[test]
fn groups_sharing_a_map_share_one_texture() {
    let mut ctx = context(assets());
    let (gpu, res) = ctx.parts();
    let mut model = Model::load(gpu, res, "models/props/props.obj").unwrap();

    assert_eq!(model.groups().len(), 3);
    assert_eq!(res.textures.use_count("models/props/textures/wood.png"), 2);
    let left = model.groups()[0].material.map(Channel::Diffuse).and_then(|t| t.handle());
    let right = model.groups()[1].material.map(Channel::Diffuse).and_then(|t| t.handle());
    assert!(left.is_some());
    assert_eq!(left, right);
    assert!(model.groups()[2].material.map(Channel::Diffuse).is_none());

    model.destroy(gpu);
    assert_eq!(res.textures.resident(), 0);
    assert_eq!(ctx.gpu.live().textures, 0);
    assert_clean(&mut ctx);
}

#[test]
fn mapped_and_flat_groups_bind_differently() {
    let mut ctx = context(assets());
    let config = ctx.config.clone();
    let (gpu, res) = ctx.parts();
    let mut shader = Shader::from_files(gpu, res.source.as_ref(), &config.scene_shader).unwrap();
    let mut model = Model::load(gpu, res, "models/props/props.obj").unwrap();
    let wood = model.groups()[0]
        .material
        .map(Channel::Diffuse)
        .and_then(|t| t.handle())
        .unwrap();

    let render_ctx = RenderContext::new(Matrix4::identity(), Matrix4::identity(), &shader);
    model.draw(gpu, &render_ctx).unwrap();
    model.destroy(gpu);
    shader.destroy(gpu);

    let textures: Vec<Vec<(u32, _)>> = ctx
        .gpu
        .draws()
        .filter_map(|c| match c {
            Command::Draw { textures, .. } => Some(textures.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(textures, vec![vec![(1, wood)], vec![(1, wood)], vec![]]);

    // The last group is flat red: its colour wins and the map flag is off.
    let program_writes: Vec<UniformValue> = ctx
        .gpu
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::SetUniform { value, .. } => Some(*value),
            _ => None,
        })
        .collect();
    assert!(program_writes.contains(&UniformValue::Vec4([1.0, 0.0, 0.0, 1.0])));
    assert!(program_writes.contains(&UniformValue::Float(8.0)));
    assert_clean(&mut ctx);
}
