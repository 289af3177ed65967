//! Command lines for the external viewer and mesh-editing hosts.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use log::info;

use crate::volume_loader::VolumeLoaderError;

/// Separates host options from the arguments passed on to its script.
pub const SCRIPT_ARGS_SEPARATOR: &str = "--";

const MACOS_SLICER: &str = "/Applications/Slicer.app/Contents/MacOS/Slicer";

/// The viewer binary: the macOS app bundle when present, else `Slicer` on `PATH`.
pub fn default_viewer() -> PathBuf {
    if cfg!(target_os = "macos") && Path::new(MACOS_SLICER).exists() {
        PathBuf::from(MACOS_SLICER)
    } else {
        PathBuf::from("Slicer")
    }
}

/// A fully assembled host invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct HostCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl HostCommand {
    /// Viewer showing a mask, optionally over a background image.
    pub fn view_mask(
        viewer: impl AsRef<Path>,
        script: impl AsRef<Path>,
        mask: impl AsRef<Path>,
        background: Option<&Path>,
    ) -> Self {
        let mut cmd = Self::script_host(viewer, "--python-script", script);
        cmd.push("--mask").push(mask.as_ref());
        if let Some(background) = background {
            cmd.push("--background").push(background);
        }
        cmd
    }

    /// Viewer showing a single intensity image.
    pub fn view_image(
        viewer: impl AsRef<Path>,
        script: impl AsRef<Path>,
        image: impl AsRef<Path>,
    ) -> Self {
        let mut cmd = Self::script_host(viewer, "--python-script", script);
        cmd.push("--image").push(image.as_ref());
        cmd
    }

    /// Mesh editor importing each of `meshes`.
    pub fn mesh_editor<P: AsRef<Path>>(
        editor: impl AsRef<Path>,
        script: impl AsRef<Path>,
        meshes: &[P],
    ) -> Self {
        let mut cmd = Self::script_host(editor, "--python", script);
        for mesh in meshes {
            cmd.push(mesh.as_ref());
        }
        cmd
    }

    fn script_host(program: impl AsRef<Path>, flag: &str, script: impl AsRef<Path>) -> Self {
        let mut cmd = Self {
            program: program.as_ref().as_os_str().to_owned(),
            args: Vec::new(),
        };
        cmd.push(flag)
            .push(script.as_ref())
            .push(SCRIPT_ARGS_SEPARATOR);
        cmd
    }

    fn push(&mut self, arg: impl AsRef<std::ffi::OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Space-separated rendering for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    fn launch_error(&self, source: std::io::Error) -> VolumeLoaderError {
        VolumeLoaderError::Launch {
            command: self.display(),
            source,
        }
    }

    /// Runs the host to completion and returns its exit code.
    ///
    /// A host killed by a signal reports exit code 1.
    pub fn run(&self) -> Result<i32, VolumeLoaderError> {
        info!("Launching: {}", self.display());
        let status = self
            .command()
            .status()
            .map_err(|e| self.launch_error(e))?;
        Ok(status.code().unwrap_or(1))
    }

    /// Starts the host without waiting for it.
    pub fn spawn(&self) -> Result<Child, VolumeLoaderError> {
        info!("Launching: {}", self.display());
        self.command().spawn().map_err(|e| self.launch_error(e))
    }
}
