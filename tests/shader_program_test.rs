mod common;

use telcom_ngin::{
    EngineError,
    assets::MemoryAssets,
    gpu::{HeadlessGpu, NO_UNIFORM, ShaderStage},
    resources::Shader,
};

use crate::common::test_utils::{SCENE_FS, SCENE_VS, UI_FS, UI_VS};

#[test]
fn bundled_shaders_expose_their_uniforms() {
    let mut gpu = HeadlessGpu::with_version("4.60 NVIDIA 535.54");
    let mut shader = Shader::from_sources(
        &mut gpu,
        &[(ShaderStage::Vertex, SCENE_VS), (ShaderStage::Fragment, SCENE_FS)],
    )
    .unwrap();
    for name in ["uProjection", "uView", "uModel", "uDiffuse", "uHasDiffuseMap", "uShininess"] {
        assert!(shader.get_uniform_location(name) >= 0, "{name} is not active");
    }
    assert_eq!(shader.get_uniform_location("doesNotExist"), NO_UNIFORM);
    shader.destroy(&mut gpu);

    let mut ui = Shader::from_sources(&mut gpu, &[(ShaderStage::Vertex, UI_VS), (ShaderStage::Fragment, UI_FS)]).unwrap();
    assert!(ui.get_uniform_location("uTexture") >= 0);
    ui.destroy(&mut gpu);
    assert_eq!(gpu.live().total(), 0);
}

#[test]
fn compile_errors_name_the_file_and_keep_the_log() {
    let mut gpu = HeadlessGpu::new();
    let assets = MemoryAssets::new()
        .with("shaders/ok.vs.glsl", UI_VS)
        .with("shaders/bad.fs.glsl", "#version 330 core\n#error unsupported material\nvoid main() {}\n");

    let err = Shader::from_files(&mut gpu, &assets, &["shaders/ok.vs.glsl", "shaders/bad.fs.glsl"]).unwrap_err();
    match err {
        EngineError::Compile { stage, name, log } => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert_eq!(name, "shaders/bad.fs.glsl");
            assert!(log.contains("unsupported material"), "{log}");
        }
        other => panic!("expected a compile error, got {other}"),
    }
    assert_eq!(gpu.live().total(), 0);
}

#[test]
fn a_program_without_fragment_stage_fails_to_link() {
    let mut gpu = HeadlessGpu::new();
    let err = Shader::from_sources(&mut gpu, &[(ShaderStage::Vertex, UI_VS)]).unwrap_err();
    assert!(matches!(err, EngineError::Link { .. }));
    assert_eq!(gpu.live().total(), 0);
}

#[test]
fn unknown_stage_suffix_is_rejected_before_compiling() {
    let mut gpu = HeadlessGpu::new();
    let assets = MemoryAssets::new().with("shaders/ui.glsl", UI_VS);
    let err = Shader::from_files(&mut gpu, &assets, &["shaders/ui.glsl"]).unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
    assert_eq!(gpu.live().total(), 0);
}

#[test]
fn binding_an_empty_shader_is_a_state_error() {
    let mut gpu = HeadlessGpu::new();
    let shader = Shader::empty();
    assert!(matches!(shader.bind(&mut gpu), Err(EngineError::State(_))));
    assert_eq!(gpu.current_program(), None);
}
