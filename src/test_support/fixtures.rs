//! Test fixtures for federation scenarios.
//!
//! The transitive-overriding federation is available both as manifest
//! text and as programmatically built containers; the two describe the
//! same graph.

use crate::core::container::{ExposeDecl, ModuleSource, RemoteDecl, SharedDecl};
use crate::core::Container;

pub const WITH_SHARED: &str = "container-with-shared";
pub const NO_SHARED: &str = "container-no-shared";
pub const APP: &str = "main";

/// Manifest text of the transitive-overriding federation.
pub const TRANSITIVE_OVERRIDING_MANIFEST: &str =
    include_str!("../../tests/fixtures/transitive-overriding/Flotilla.toml");

/// `container-with-shared`: shares `shared` as overridable, but pins it
/// for its exposed module `./b`.
pub fn with_shared() -> Container {
    Container::builder(WITH_SHARED)
        .module("./a.js", ModuleSource::reexport("shared"))
        .module("./b.js", ModuleSource::reexport("shared"))
        .module("./modules.js", ModuleSource::ListModules)
        .module("./shared.js", ModuleSource::value("shared"))
        .expose(ExposeDecl::new("./a", "./a.js"))
        .expose(
            ExposeDecl::new("./b", "./b.js")
                .with_shared(SharedDecl::new("shared", "./shared").pinned()),
        )
        .expose(ExposeDecl::new("./modules", "./modules.js"))
        .shared(SharedDecl::new("shared", "./shared"))
        .build()
}

/// `container-no-shared`: consumes `container-with-shared` and overrides
/// `shared` with its own module.
pub fn no_shared() -> Container {
    let remote = |exposed: &str| ModuleSource::reexport(format!("{}/{}", WITH_SHARED, exposed));
    Container::builder(NO_SHARED)
        .module("./a.js", remote("a"))
        .module("./b.js", remote("b"))
        .module("./modules.js", ModuleSource::ListModules)
        .module("./modules-from-remote.js", remote("modules"))
        .module("./new-shared.js", ModuleSource::value("new shared"))
        .expose(ExposeDecl::new("./a", "./a.js"))
        .expose(ExposeDecl::new("./b", "./b.js"))
        .expose(ExposeDecl::new("./modules", "./modules.js"))
        .expose(ExposeDecl::new("./modules-from-remote", "./modules-from-remote.js"))
        .remote(RemoteDecl::new(WITH_SHARED, WITH_SHARED))
        .override_shared(SharedDecl::new("shared", "./new-shared"))
        .build()
}

/// `main`: the build root, consuming `container-no-shared`.
pub fn app() -> Container {
    Container::builder(APP)
        .module("./index.js", ModuleSource::ListModules)
        .module("./shared.js", ModuleSource::value("shared"))
        .remote(RemoteDecl::new(NO_SHARED, NO_SHARED))
        .build()
}

/// All three containers in manifest order.
pub fn transitive_overriding() -> Vec<Container> {
    vec![with_shared(), no_shared(), app()]
}
