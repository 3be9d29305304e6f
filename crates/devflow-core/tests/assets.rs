//! Asset compilation and release packaging with a recording runner.

use devflow_core::{
    AssetCompiler, BindingGenerator, DevflowConfig, LicenseKind, LicenseTable, MeshJob,
    ReleasePackager, ShaderJob, TextureJob,
};
use devflow_test_utils::{write_file, RecordingRunner};
use std::path::PathBuf;

fn project() -> (tempfile::TempDir, DevflowConfig) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DevflowConfig::new(dir.path());
    config.assets.install_textures = vec![PathBuf::from("ui/textures")];
    config.assets.textures = vec![TextureJob {
        dir: PathBuf::from("prefabs/creatures/giant_ant"),
        file: "giant_ant_albedo.png".into(),
        format: "BC1_UNORM_SRGB".into(),
    }];
    config.assets.shaders = vec![ShaderJob {
        input: PathBuf::from("terrain.vert.hlsl"),
        output: PathBuf::from("terrain.vert"),
        stage: "vs".into(),
        entry: "main".into(),
    }];
    config.assets.meshes = vec![MeshJob {
        dir: PathBuf::from("prefabs/props/bow_arrow"),
    }];
    (dir, config)
}

#[test]
fn compile_all_installs_and_converts() {
    let (dir, config) = project();
    write_file(dir.path(), "content/ui/textures/button.png", "png");
    let runner = RecordingRunner::new().producing_outputs();

    let summary = AssetCompiler::new(&config, runner.clone()).compile_all().unwrap();

    assert_eq!(summary.installed_files, 1);
    assert_eq!((summary.textures, summary.shaders, summary.meshes), (1, 1, 1));
    assert!(dir
        .path()
        .join("zig-out/bin/content/ui/textures/button.png")
        .is_file());

    let programs: Vec<_> = runner.calls().iter().map(|c| c.program_name()).collect();
    assert_eq!(programs, ["texconv.exe", "dxc.exe", "AssetPipelineCmd.exe"]);
}

/// A converter that exits cleanly without writing its output is an error.
#[test]
fn missing_texture_output_is_reported() {
    let (_dir, config) = project();
    let runner = RecordingRunner::new();

    let err = AssetCompiler::new(&config, runner).compile_textures().unwrap_err();

    assert_eq!(err.kind(), "missing_artifact");
    assert!(err.to_string().contains("giant_ant_albedo.dds"));
}

#[test]
fn failing_shader_compiler_stops_compilation() {
    let (dir, config) = project();
    write_file(dir.path(), "content/ui/textures/button.png", "png");
    let runner = RecordingRunner::new().producing_outputs();
    runner.fail("dxc.exe");

    let err = AssetCompiler::new(&config, runner.clone()).compile_all().unwrap_err();

    assert_eq!(err.kind(), "tool_failed");
    assert!(runner
        .calls()
        .iter()
        .all(|c| c.program_name() != "AssetPipelineCmd.exe"));
}

#[test]
fn release_archive_contains_build_and_licenses() {
    let (dir, mut config) = project();
    write_file(
        dir.path(),
        "src/licenses.csv",
        "Used\tName\tOrigin\tLicense\nY\tzig-gamedev\tgithub\tMIT\n",
    );
    config.licenses.tables = vec![LicenseTable::new("src/licenses.csv", LicenseKind::Code)];

    let runner = RecordingRunner::new().producing_outputs();
    let root = dir.path().to_path_buf();
    runner.on("zig", move |_| {
        write_file(&root, "zig-out/bin/TidesOfRevival.exe", "exe");
    });

    let artifacts = ReleasePackager::new(&config, runner).package().unwrap();

    assert_eq!(artifacts.archived_files, 2);
    assert!(artifacts.archive.is_file());
    let licenses = std::fs::read_to_string(artifacts.staging_dir.join("licenses.txt")).unwrap();
    assert!(licenses.starts_with("-------------\nCODE LICENCES\n"));
}

#[test]
fn bindings_build_generator_then_each_header() {
    let (_dir, mut config) = project();
    config.bindings.headers = vec![PathBuf::from(
        "zig-recastnavigation/Detour/Include/DetourCommon.h",
    )];
    let runner = RecordingRunner::new().producing_outputs();

    let count = BindingGenerator::new(&config, runner.clone()).generate().unwrap();

    assert_eq!(count, 1);
    let expected = format!(
        "{} DetourCommon.h",
        config.external_dir().join("c2z/zig-out/bin/c2z").display()
    );
    assert_eq!(runner.command_lines().last(), Some(&expected));
}
