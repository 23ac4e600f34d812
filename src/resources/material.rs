//! Surface parameters and how they reach the shader.
//!
//! Each of the ambient, diffuse and specular channels is either a flat colour
//! or a texture map. A mapped channel is bound to its own texture unit, its
//! sampler uniform is pointed at that unit, `uHas<Channel>Map` is set to 1
//! and the flat colour uniform is zeroed. An unmapped channel uploads its
//! flat colour, sets `uHas<Channel>Map` to 0 and leaves units and samplers
//! alone.

use cgmath::{Vector4, Zero};

use crate::{
    context::Resources,
    error::Result,
    gpu::Gpu,
    obj::ObjMaterial,
    resources::{shader::Shader, texture::Texture},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Ambient,
    Diffuse,
    Specular,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Ambient, Channel::Diffuse, Channel::Specular];

    pub fn unit(self) -> u32 {
        match self {
            Channel::Ambient => 0,
            Channel::Diffuse => 1,
            Channel::Specular => 2,
        }
    }

    pub fn color_uniform(self) -> &'static str {
        match self {
            Channel::Ambient => "uAmbient",
            Channel::Diffuse => "uDiffuse",
            Channel::Specular => "uSpecular",
        }
    }

    pub fn sampler_uniform(self) -> &'static str {
        match self {
            Channel::Ambient => "uAmbientMap",
            Channel::Diffuse => "uDiffuseMap",
            Channel::Specular => "uSpecularMap",
        }
    }

    pub fn flag_uniform(self) -> &'static str {
        match self {
            Channel::Ambient => "uHasAmbientMap",
            Channel::Diffuse => "uHasDiffuseMap",
            Channel::Specular => "uHasSpecularMap",
        }
    }
}

/// What a material is made of before any texture is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    pub ambient: Vector4<f32>,
    pub diffuse: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub shininess: f32,
    pub ambient_map: Option<String>,
    pub diffuse_map: Option<String>,
    pub specular_map: Option<String>,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            ambient: Vector4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vector4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vector4::zero(),
            shininess: 0.0,
            ambient_map: None,
            diffuse_map: None,
            specular_map: None,
        }
    }
}

impl From<&ObjMaterial> for MaterialDesc {
    fn from(material: &ObjMaterial) -> Self {
        Self {
            ambient: material.ambient.extend(1.0),
            diffuse: material.diffuse.extend(1.0),
            specular: material.specular.extend(1.0),
            shininess: material.shininess,
            ambient_map: material.ambient_map.clone(),
            diffuse_map: material.diffuse_map.clone(),
            specular_map: material.specular_map.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Material {
    pub ambient: Vector4<f32>,
    pub diffuse: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub shininess: f32,
    ambient_map: Option<Texture>,
    diffuse_map: Option<Texture>,
    specular_map: Option<Texture>,
}

impl Default for Material {
    fn default() -> Self {
        let desc = MaterialDesc::default();
        Self::new(desc.ambient, desc.diffuse, desc.specular)
    }
}

impl Material {
    /// A material of flat colours only.
    pub fn new(ambient: Vector4<f32>, diffuse: Vector4<f32>, specular: Vector4<f32>) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            shininess: 0.0,
            ambient_map: None,
            diffuse_map: None,
            specular_map: None,
        }
    }

    /// Builds a material and acquires its maps through the texture cache.
    /// If any map fails to load, the maps acquired so far are released.
    pub fn load(gpu: &mut dyn Gpu, res: &mut Resources, desc: &MaterialDesc) -> Result<Self> {
        let mut material = Self::new(desc.ambient, desc.diffuse, desc.specular);
        material.shininess = desc.shininess;
        let maps = [
            (Channel::Ambient, &desc.ambient_map),
            (Channel::Diffuse, &desc.diffuse_map),
            (Channel::Specular, &desc.specular_map),
        ];
        for (channel, path) in maps {
            let Some(path) = path else { continue };
            match res.acquire_texture(gpu, path) {
                Ok(texture) => *material.slot(channel) = Some(texture),
                Err(err) => {
                    material.destroy(gpu);
                    return Err(err);
                }
            }
        }
        Ok(material)
    }

    fn slot(&mut self, channel: Channel) -> &mut Option<Texture> {
        match channel {
            Channel::Ambient => &mut self.ambient_map,
            Channel::Diffuse => &mut self.diffuse_map,
            Channel::Specular => &mut self.specular_map,
        }
    }

    pub fn map(&self, channel: Channel) -> Option<&Texture> {
        match channel {
            Channel::Ambient => self.ambient_map.as_ref(),
            Channel::Diffuse => self.diffuse_map.as_ref(),
            Channel::Specular => self.specular_map.as_ref(),
        }
    }

    pub fn color(&self, channel: Channel) -> Vector4<f32> {
        match channel {
            Channel::Ambient => self.ambient,
            Channel::Diffuse => self.diffuse,
            Channel::Specular => self.specular,
        }
    }

    /// Puts `texture` on `channel`, releasing the map it replaces.
    pub fn set_map(&mut self, gpu: &mut dyn Gpu, channel: Channel, texture: Option<Texture>) {
        if let Some(old) = std::mem::replace(self.slot(channel), texture) {
            old.release(gpu);
        }
    }

    pub fn bind(&self, gpu: &mut dyn Gpu, shader: &Shader) -> Result<()> {
        for channel in Channel::ALL {
            match self.map(channel) {
                Some(texture) => {
                    texture.bind(gpu, channel.unit())?;
                    shader.set_int(gpu, channel.sampler_uniform(), channel.unit() as i32);
                    shader.set_int(gpu, channel.flag_uniform(), 1);
                    shader.set_vec4(gpu, channel.color_uniform(), Vector4::zero());
                }
                None => {
                    shader.set_vec4(gpu, channel.color_uniform(), self.color(channel));
                    shader.set_int(gpu, channel.flag_uniform(), 0);
                }
            }
        }
        shader.set_float(gpu, "uShininess", self.shininess);
        Ok(())
    }

    /// Clears the three material texture units.
    pub fn unbind(gpu: &mut dyn Gpu) {
        for channel in Channel::ALL {
            gpu.bind_texture(channel.unit(), None);
        }
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        for channel in Channel::ALL {
            if let Some(texture) = self.slot(channel).take() {
                texture.release(gpu);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::{
        assets::MemoryAssets,
        gpu::{HeadlessGpu, ShaderStage, TextureParams, UniformValue},
    };

    const VS: &str = "#version 410 core\nvoid main() {}\n";
    const FS: &str = "#version 410 core
uniform vec4 uAmbient;
uniform vec4 uDiffuse;
uniform vec4 uSpecular;
uniform sampler2D uAmbientMap;
uniform sampler2D uDiffuseMap;
uniform sampler2D uSpecularMap;
uniform int uHasAmbientMap;
uniform int uHasDiffuseMap;
uniform int uHasSpecularMap;
void main() {}
";

    fn png() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::from(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn setup() -> (HeadlessGpu, Resources, Shader) {
        let mut gpu = HeadlessGpu::new();
        let assets = MemoryAssets::new().with("wood.png", png());
        let res = Resources::new(Box::new(assets), TextureParams::default());
        let shader =
            Shader::from_sources(&mut gpu, &[(ShaderStage::Vertex, VS), (ShaderStage::Fragment, FS)]).unwrap();
        (gpu, res, shader)
    }

    #[test]
    fn mapped_channels_sample_and_flat_channels_upload_colour() {
        let (mut gpu, mut res, mut shader) = setup();
        let desc = MaterialDesc {
            diffuse: Vector4::new(1.0, 0.0, 0.0, 1.0),
            specular: Vector4::new(0.0, 1.0, 0.0, 1.0),
            diffuse_map: Some("wood.png".to_string()),
            ..Default::default()
        };
        let mut material = Material::load(&mut gpu, &mut res, &desc).unwrap();
        let program = shader.handle().unwrap();
        shader.bind(&mut gpu).unwrap();
        material.bind(&mut gpu, &shader).unwrap();

        let wood = material.map(Channel::Diffuse).unwrap().handle();
        assert_eq!(gpu.bound_texture(1), wood);
        assert_eq!(gpu.bound_texture(0), None);
        assert_eq!(gpu.bound_texture(2), None);
        assert_eq!(gpu.uniform(program, "uDiffuseMap"), Some(UniformValue::Int(1)));
        assert_eq!(gpu.uniform(program, "uHasDiffuseMap"), Some(UniformValue::Int(1)));
        assert_eq!(gpu.uniform(program, "uDiffuse"), Some(UniformValue::Vec4([0.0; 4])));

        assert_eq!(gpu.uniform(program, "uSpecular"), Some(UniformValue::Vec4([0.0, 1.0, 0.0, 1.0])));
        assert_eq!(gpu.uniform(program, "uHasSpecularMap"), Some(UniformValue::Int(0)));
        assert_eq!(gpu.uniform(program, "uSpecularMap"), None);
        assert_eq!(gpu.uniform(program, "uAmbientMap"), None);

        Material::unbind(&mut gpu);
        assert_eq!(gpu.bound_texture(1), None);

        material.destroy(&mut gpu);
        shader.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn shared_maps_are_released_per_material() {
        let (mut gpu, mut res, mut shader) = setup();
        let desc = MaterialDesc {
            ambient_map: Some("wood.png".to_string()),
            diffuse_map: Some("wood.png".to_string()),
            ..Default::default()
        };
        let mut a = Material::load(&mut gpu, &mut res, &desc).unwrap();
        let mut b = Material::load(&mut gpu, &mut res, &desc).unwrap();
        assert_eq!(res.textures.use_count("wood.png"), 4);
        assert_eq!(gpu.live().textures, 1);
        a.destroy(&mut gpu);
        assert_eq!(gpu.live().textures, 1);
        b.destroy(&mut gpu);
        assert_eq!(gpu.live().textures, 0);
        shader.destroy(&mut gpu);
    }

    #[test]
    fn failed_map_releases_the_others() {
        let (mut gpu, mut res, mut shader) = setup();
        let desc = MaterialDesc {
            ambient_map: Some("wood.png".to_string()),
            specular_map: Some("missing.png".to_string()),
            ..Default::default()
        };
        assert!(Material::load(&mut gpu, &mut res, &desc).is_err());
        assert_eq!(gpu.live().textures, 0);
        assert_eq!(res.textures.resident(), 0);
        shader.destroy(&mut gpu);
    }
}
