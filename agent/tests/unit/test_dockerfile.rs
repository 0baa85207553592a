//! Recipe synthesis unit tests

use dpagent::build::dockerfile::{render, RecipePlan};
use dpagent::models::build::{Framework, PackageManager};

fn plan(framework: Framework) -> RecipePlan {
    RecipePlan {
        framework,
        package_manager: PackageManager::Npm,
        has_lockfile: true,
        build_command: None,
        start_command: None,
        output_directory: "dist".to_string(),
        port: 3000,
        nuxt_major: 3,
    }
}

#[test]
fn nextjs_without_lockfile_uses_plain_install() {
    let mut plan = plan(Framework::Nextjs);
    plan.has_lockfile = false;

    let recipe = render(&plan);
    assert!(recipe.contains("RUN npm install\n"));
    assert!(!recipe.contains("npm ci"));
    // Multi-stage Next.js form
    assert!(recipe.contains("COPY --from=build /app/.next ./.next"));
    assert!(recipe.contains("COPY --from=build /app/node_modules ./node_modules"));
    assert!(recipe.contains("COPY --from=build /app/public ./public"));
    assert!(recipe.contains("RUN mkdir -p public"));
    assert!(recipe.contains("EXPOSE 3000"));
    assert!(recipe.contains(r#"CMD ["npm", "start"]"#));
}

#[test]
fn nextjs_with_lockfile_is_frozen() {
    let recipe = render(&plan(Framework::Nextjs));
    assert!(recipe.contains("RUN npm ci\n"));
}

#[test]
fn pnpm_lockfile_install_is_frozen_and_global() {
    let mut plan = plan(Framework::React);
    plan.package_manager = PackageManager::Pnpm;

    let recipe = render(&plan);
    let global = recipe.find("npm install -g pnpm").unwrap();
    let frozen = recipe.find("pnpm install --frozen-lockfile").unwrap();
    assert!(global < frozen);
}

#[test]
fn static_bundle_locates_nested_index_html() {
    let mut plan = plan(Framework::Angular);
    plan.output_directory = "dist/my-app".to_string();

    let recipe = render(&plan);
    assert!(recipe.contains("find /app/dist/my-app -name index.html"));
    assert!(recipe.contains("cp -a \"$(dirname \"$target\")/.\" /app/_output/"));
    assert!(recipe.contains("FROM nginx:alpine"));
    assert!(recipe.contains("COPY --from=build /app/_output /usr/share/nginx/html"));
    assert!(recipe.contains("EXPOSE 80"));
}

#[test]
fn legacy_webpack_frameworks_get_the_openssl_shim() {
    let angular = render(&plan(Framework::Angular));
    assert!(angular.contains("ENV NODE_OPTIONS=--openssl-legacy-provider"));
    assert!(!angular.contains("PUBLIC_URL"));

    let react = render(&plan(Framework::React));
    assert!(react.contains("ENV NODE_OPTIONS=--openssl-legacy-provider"));
    assert!(react.contains("ENV PUBLIC_URL=/"));

    let vite = render(&plan(Framework::Vite));
    assert!(!vite.contains("NODE_OPTIONS"));
}

#[test]
fn classic_svelte_ships_the_public_directory() {
    let recipe = render(&plan(Framework::Svelte));
    assert!(recipe.contains("COPY --from=build /app/public /usr/share/nginx/html"));
    assert!(!recipe.contains("_output"));
}

#[test]
fn nuxt_v2_runs_the_full_tree() {
    let mut plan = plan(Framework::Nuxt);
    plan.nuxt_major = 2;

    let recipe = render(&plan);
    assert!(recipe.contains("ENV HOST=0.0.0.0"));
    assert!(recipe.contains(r#"CMD ["npx", "nuxt", "start"]"#));
    assert!(!recipe.contains(".output"));
}

#[test]
fn nuxt_v3_ships_only_the_output() {
    let recipe = render(&plan(Framework::Nuxt));
    assert!(recipe.contains("COPY --from=build /app/.output ./.output"));
    assert!(recipe.contains("COPY --from=build /app/package*.json ./"));
    assert!(recipe.contains(r#"CMD ["node", ".output/server/index.mjs"]"#));
}

#[test]
fn nestjs_copies_dist_and_node_modules() {
    let recipe = render(&plan(Framework::Nestjs));
    assert!(recipe.contains("COPY --from=build /app/dist ./dist"));
    assert!(recipe.contains(r#"CMD ["node", "dist/main"]"#));
}

#[test]
fn nodejs_with_build_prunes_dev_deps() {
    let mut plan = plan(Framework::Nodejs);
    plan.build_command = Some("npm run build".to_string());
    plan.start_command = Some("node dist/server.js --trace-warnings".to_string());

    let recipe = render(&plan);
    assert!(recipe.contains("RUN npm prune --omit=dev"));
    assert!(recipe.contains(r#"CMD ["node", "dist/server.js", "--trace-warnings"]"#));
}

#[test]
fn nodejs_without_build_installs_production_only() {
    let mut plan = plan(Framework::Nodejs);
    plan.start_command = Some("node index.js".to_string());

    let recipe = render(&plan);
    assert!(recipe.contains("RUN npm ci --omit=dev"));
    assert!(!recipe.contains("AS build"));
    assert!(recipe.contains(r#"CMD ["node", "index.js"]"#));
}

#[test]
fn lockfile_copy_globs_tolerate_absence() {
    let recipe = render(&plan(Framework::Nodejs));
    assert!(recipe.contains(
        "COPY package.json package-lock.json* yarn.lock* pnpm-lock.yaml* pnpm-workspace.yaml* .npmrc* ./"
    ));
}

#[test]
fn rendering_is_deterministic() {
    for framework in [
        Framework::Angular,
        Framework::Nextjs,
        Framework::Nuxt,
        Framework::Nestjs,
        Framework::Nodejs,
        Framework::Svelte,
    ] {
        let plan = plan(framework);
        assert_eq!(render(&plan), render(&plan), "{framework} recipe drifted");
    }
}
