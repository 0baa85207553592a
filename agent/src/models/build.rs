//! Build pipeline types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Application frameworks the build engine can synthesize recipes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    Angular,
    React,
    ReactVite,
    Vue,
    VueVite,
    Svelte,
    SvelteVite,
    Vite,
    Nextjs,
    Nuxt,
    Nodejs,
    Nestjs,
    Docker,
    Static,
}

impl Framework {
    /// Frameworks whose build output is a static bundle served by nginx.
    /// Classic svelte is excluded: it has its own recipe that ships the
    /// whole `public/` directory.
    pub fn is_static_bundle(&self) -> bool {
        matches!(
            self,
            Self::Angular
                | Self::React
                | Self::ReactVite
                | Self::Vue
                | Self::VueVite
                | Self::SvelteVite
                | Self::Vite
                | Self::Static
        )
    }

    /// Legacy webpack toolchains that need the OpenSSL 1.x provider shim
    /// under current Node releases.
    pub fn is_legacy_webpack(&self) -> bool {
        matches!(self, Self::Angular | Self::React | Self::Vue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Angular => "angular",
            Self::React => "react",
            Self::ReactVite => "react-vite",
            Self::Vue => "vue",
            Self::VueVite => "vue-vite",
            Self::Svelte => "svelte",
            Self::SvelteVite => "svelte-vite",
            Self::Vite => "vite",
            Self::Nextjs => "nextjs",
            Self::Nuxt => "nuxt",
            Self::Nodejs => "nodejs",
            Self::Nestjs => "nestjs",
            Self::Docker => "docker",
            Self::Static => "static",
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JavaScript package managers, detected from lockfiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }
}

/// Typed input to the build engine
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub app_name: String,
    pub deployment_id: String,
    pub git_repo_url: String,
    pub git_branch: String,
    pub git_token: Option<String>,
    pub framework: Framework,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub output_directory: Option<String>,
    pub port: u16,
    pub env_vars: HashMap<String, String>,
    pub nuxt_major_version: Option<u32>,
}

/// Outcome of one build pipeline run
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub success: bool,

    /// Fully qualified reference resolvable by the cluster runtime after
    /// import (`docker.io/library/<app>:<deployment>`)
    pub image_name: String,

    pub exposed_port: u16,

    /// Accumulated pipeline log buffer
    pub logs: String,

    pub error: Option<String>,
}

impl BuildArtifact {
    pub fn failure(error: impl Into<String>, logs: String) -> Self {
        Self {
            success: false,
            image_name: String::new(),
            exposed_port: 0,
            logs,
            error: Some(error.into()),
        }
    }
}
