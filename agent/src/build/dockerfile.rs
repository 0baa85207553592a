//! Container recipe synthesis
//!
//! Pure templating: a [`RecipePlan`] in, Dockerfile bytes out. Given equal
//! inputs the output is byte-identical, which keeps recipes testable and
//! reproducible across agents.

use tracing::warn;

use crate::models::build::{Framework, PackageManager};

const NODE_IMAGE: &str = "node:20-alpine";
const NGINX_IMAGE: &str = "nginx:alpine";

/// Everything recipe selection depends on
#[derive(Debug, Clone)]
pub struct RecipePlan {
    pub framework: Framework,
    pub package_manager: PackageManager,
    pub has_lockfile: bool,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub output_directory: String,
    pub port: u16,
    pub nuxt_major: u32,
}

/// Synthesize the Dockerfile for a plan
pub fn render(plan: &RecipePlan) -> String {
    if !plan.has_lockfile {
        warn!(
            "No lockfile found; falling back to a non-frozen {} install",
            plan.package_manager.as_str()
        );
    }

    match plan.framework {
        Framework::Svelte => svelte_classic(plan),
        Framework::Nextjs => nextjs(plan),
        Framework::Nuxt if plan.nuxt_major <= 2 => nuxt_v2(plan),
        Framework::Nuxt => nuxt_v3(plan),
        Framework::Nestjs => nestjs(plan),
        Framework::Nodejs => nodejs(plan),
        // `docker` with no Dockerfile falls back on the other fields: a
        // start command means a server, otherwise a static bundle.
        Framework::Docker if plan.start_command.is_some() => nodejs(plan),
        // Everything remaining is a static bundle behind nginx.
        _ => static_bundle(plan),
    }
}

/// Lockfile copy tolerates absence: everything but package.json is globbed.
fn copy_manifests() -> &'static str {
    "COPY package.json package-lock.json* yarn.lock* pnpm-lock.yaml* pnpm-workspace.yaml* .npmrc* ./"
}

/// Install phase. Frozen installs require a lockfile; pnpm needs a global
/// install of itself first.
fn install_phase(plan: &RecipePlan, production_only: bool) -> String {
    let mut lines = String::new();
    if plan.package_manager == PackageManager::Pnpm {
        lines.push_str("RUN npm install -g pnpm\n");
    }

    let install = match (plan.package_manager, plan.has_lockfile, production_only) {
        (PackageManager::Pnpm, true, false) => "RUN pnpm install --frozen-lockfile",
        (PackageManager::Pnpm, true, true) => "RUN pnpm install --frozen-lockfile --prod",
        (PackageManager::Pnpm, false, false) => "RUN pnpm install",
        (PackageManager::Pnpm, false, true) => "RUN pnpm install --prod",
        (PackageManager::Yarn, true, false) => "RUN yarn install --frozen-lockfile",
        (PackageManager::Yarn, true, true) => {
            "RUN yarn install --frozen-lockfile --production"
        }
        (PackageManager::Yarn, false, false) => "RUN yarn install",
        (PackageManager::Yarn, false, true) => "RUN yarn install --production",
        (PackageManager::Npm, true, false) => "RUN npm ci",
        (PackageManager::Npm, true, true) => "RUN npm ci --omit=dev",
        (PackageManager::Npm, false, false) => "RUN npm install",
        (PackageManager::Npm, false, true) => "RUN npm install --omit=dev",
    };
    lines.push_str(install);
    lines
}

fn build_command(plan: &RecipePlan) -> String {
    match plan.build_command.as_deref() {
        Some(cmd) if !cmd.is_empty() => cmd.to_string(),
        _ => format!("{} run build", plan.package_manager.as_str()),
    }
}

/// `<pm> start` as a JSON-array entrypoint
fn start_entry(package_manager: PackageManager) -> &'static str {
    match package_manager {
        PackageManager::Npm => r#"CMD ["npm", "start"]"#,
        PackageManager::Yarn => r#"CMD ["yarn", "start"]"#,
        PackageManager::Pnpm => r#"CMD ["pnpm", "start"]"#,
    }
}

/// Split a command line on whitespace into a JSON-array entrypoint
fn exec_form(command: &str) -> String {
    let parts: Vec<String> = command
        .split_whitespace()
        .map(|part| format!("\"{}\"", part.replace('"', "\\\"")))
        .collect();
    format!("CMD [{}]", parts.join(", "))
}

/// Env lines for legacy webpack toolchains
fn legacy_env(plan: &RecipePlan) -> String {
    let mut lines = String::new();
    if plan.framework.is_legacy_webpack() {
        lines.push_str("ENV NODE_OPTIONS=--openssl-legacy-provider\n");
    }
    if plan.framework == Framework::React {
        lines.push_str("ENV PUBLIC_URL=/\n");
    }
    lines
}

/// Static bundle: build under Node, locate the directory holding
/// index.html (Angular 17+ nests a `browser/` dir), serve it from nginx.
fn static_bundle(plan: &RecipePlan) -> String {
    format!(
        r#"FROM {node} AS build
WORKDIR /app
{copy}
{install}
COPY . .
{env}RUN {build}
RUN set -e; \
    target="$(find /app/{out} -name index.html -not -path '*/node_modules/*' | head -n 1)"; \
    if [ -z "$target" ]; then echo "index.html not found under {out}" >&2; exit 1; fi; \
    mkdir -p /app/_output; \
    cp -a "$(dirname "$target")/." /app/_output/

FROM {nginx}
COPY --from=build /app/_output /usr/share/nginx/html
EXPOSE 80
CMD ["nginx", "-g", "daemon off;"]
"#,
        node = NODE_IMAGE,
        nginx = NGINX_IMAGE,
        copy = copy_manifests(),
        install = install_phase(plan, false),
        env = legacy_env(plan),
        build = build_command(plan),
        out = plan.output_directory,
    )
}

/// Classic svelte (rollup, no Vite): the bundle lands inside `public/`,
/// which ships to nginx wholesale.
fn svelte_classic(plan: &RecipePlan) -> String {
    format!(
        r#"FROM {node} AS build
WORKDIR /app
{copy}
{install}
COPY . .
RUN {build}

FROM {nginx}
COPY --from=build /app/public /usr/share/nginx/html
EXPOSE 80
CMD ["nginx", "-g", "daemon off;"]
"#,
        node = NODE_IMAGE,
        nginx = NGINX_IMAGE,
        copy = copy_manifests(),
        install = install_phase(plan, false),
        build = build_command(plan),
    )
}

fn nextjs(plan: &RecipePlan) -> String {
    format!(
        r#"FROM {node} AS build
WORKDIR /app
{copy}
{install}
COPY . .
RUN mkdir -p public
RUN {build}

FROM {node}
WORKDIR /app
ENV NODE_ENV=production
COPY --from=build /app/.next ./.next
COPY --from=build /app/node_modules ./node_modules
COPY --from=build /app/package.json ./package.json
COPY --from=build /app/public ./public
EXPOSE 3000
{start}
"#,
        node = NODE_IMAGE,
        copy = copy_manifests(),
        install = install_phase(plan, false),
        build = build_command(plan),
        start = start_entry(plan.package_manager),
    )
}

/// Nuxt 2 runs out of the full app tree
fn nuxt_v2(plan: &RecipePlan) -> String {
    format!(
        r#"FROM {node}
WORKDIR /app
{copy}
{install}
COPY . .
RUN {build}
ENV HOST=0.0.0.0
EXPOSE 3000
CMD ["npx", "nuxt", "start"]
"#,
        node = NODE_IMAGE,
        copy = copy_manifests(),
        install = install_phase(plan, false),
        build = build_command(plan),
    )
}

/// Nuxt 3 ships only the compiled `.output` server
fn nuxt_v3(plan: &RecipePlan) -> String {
    format!(
        r#"FROM {node} AS build
WORKDIR /app
{copy}
{install}
COPY . .
RUN {build}

FROM {node}
WORKDIR /app
COPY --from=build /app/.output ./.output
COPY --from=build /app/package*.json ./
EXPOSE 3000
CMD ["node", ".output/server/index.mjs"]
"#,
        node = NODE_IMAGE,
        copy = copy_manifests(),
        install = install_phase(plan, false),
        build = build_command(plan),
    )
}

/// NestJS needs dev dependencies in the builder so `nest build` resolves
fn nestjs(plan: &RecipePlan) -> String {
    format!(
        r#"FROM {node} AS build
WORKDIR /app
{copy}
{install}
COPY . .
RUN {build}

FROM {node}
WORKDIR /app
ENV NODE_ENV=production
COPY --from=build /app/dist ./dist
COPY --from=build /app/node_modules ./node_modules
COPY --from=build /app/package.json ./package.json
EXPOSE {port}
CMD ["node", "dist/main"]
"#,
        node = NODE_IMAGE,
        copy = copy_manifests(),
        install = install_phase(plan, false),
        build = build_command(plan),
        port = plan.port,
    )
}

fn nodejs(plan: &RecipePlan) -> String {
    let start = plan
        .start_command
        .clone()
        .filter(|cmd| !cmd.is_empty())
        .map(|cmd| exec_form(&cmd))
        .unwrap_or_else(|| start_entry(plan.package_manager).to_string());

    match plan.build_command.as_deref().filter(|cmd| !cmd.is_empty()) {
        Some(build) => {
            let prune = match plan.package_manager {
                PackageManager::Npm => "RUN npm prune --omit=dev",
                PackageManager::Yarn => "RUN yarn install --production --ignore-scripts",
                PackageManager::Pnpm => "RUN pnpm prune --prod",
            };
            format!(
                r#"FROM {node} AS build
WORKDIR /app
{copy}
{install}
COPY . .
RUN {build}
{prune}

FROM {node}
WORKDIR /app
ENV NODE_ENV=production
COPY --from=build /app ./
EXPOSE {port}
{start}
"#,
                node = NODE_IMAGE,
                copy = copy_manifests(),
                install = install_phase(plan, false),
                build = build,
                prune = prune,
                port = plan.port,
                start = start,
            )
        }
        None => format!(
            r#"FROM {node}
WORKDIR /app
{copy}
{install}
COPY . .
ENV NODE_ENV=production
EXPOSE {port}
{start}
"#,
            node = NODE_IMAGE,
            copy = copy_manifests(),
            install = install_phase(plan, true),
            port = plan.port,
            start = start,
        ),
    }
}
