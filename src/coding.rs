/// The smallest compute program a working device must be able to build a pipeline from
const SMOKE_TEST_SOURCE: &str = "
@group(0) @binding(0)
var<storage, read_write> data: array<u32>;

@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] + 1u;
}
";

/// The [`Shader`] is a struct containing WGSL code together with its compute entry point
///
/// This struct is not able to read or check WGSL code, it's only purpose is to
/// hold the content of it and feeding it to a [`crate::backend::GpuDevice`].
///
/// All the code checking is done when the device compiles it (by `Naga` when the device
/// is a `wgpu` one), never through this stage of the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    content: String,
    entry_point: String,
}

impl Shader {
    /// This method creates a shader from a string literal.
    ///
    /// No effort whatsoever is done at this stage to check the correctnes of the shader
    ///
    /// # Arguments
    /// * - `content` - a string holding the code of the shader
    /// * - `entry_point` - the name of the compute function inside `content`
    ///
    /// # Example
    /// ```
    /// use gpu_probe::coding::Shader;
    ///  let shader = Shader::from_content("
    ///     @compute @workgroup_size(64)
    ///     fn noop (@builtin(global_invocation_id) id: vec3<u32>) {}
    /// ", "noop");
    /// assert_eq!(shader.entry_point(), "noop");
    /// ```
    pub fn from_content(content: &str, entry_point: &str) -> Self {
        Shader {
            content: content.to_string(),
            entry_point: entry_point.to_string(),
        }
    }

    /// The program compiled by the last check of a probe run
    ///
    /// It binds one storage buffer, so building a pipeline out of it also exercises
    /// the automatic bind group layout of the device.
    pub fn smoke_test() -> Self {
        Shader::from_content(SMOKE_TEST_SOURCE, "main")
    }

    /// This methods gets the content of the [`Shader`] as a string reference
    pub fn get_content(&self) -> &str {
        &self.content
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}
