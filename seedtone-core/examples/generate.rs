use std::path::Path;

use seedtone_core::probe::ModelChoice;
use seedtone_core::provider::{
    Device, GenerationRequest, InitOptions, Seed, SynthesisProvider, TaskKind,
};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let prompt = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        "dusty lo-fi hip hop beat with mellow rhodes".to_string()
    };

    let model = ModelChoice {
        name: "musicgen-small".to_string(),
        dir: Path::new("models/musicgen-small").to_path_buf(),
    };
    let options = InitOptions {
        device: Device::Cpu,
        checkpoint_dir: Path::new("models").to_path_buf(),
        use_flash_attention: false,
        compile_model: false,
        offload_to_cpu: false,
        intra_threads: None,
    };

    println!("Prompt: {}", prompt);
    println!("Model: {}", model.dir.display());

    let (mut provider, status) =
        seedtone_core::musicgen::MusicGenProvider::initialize(&model, &options)
            .expect("failed to initialize");
    println!("{}", status);

    let request = GenerationRequest {
        task: TaskKind::Text2Music,
        caption: prompt,
        lyrics: "[Instrumental]".to_string(),
        instrumental: true,
        duration_secs: 8.0,
        bpm: Some(80),
        keyscale: None,
        inference_steps: 8,
        guidance_scale: 3.0,
        seed: Seed::Random,
    };
    let result = provider
        .generate(&request, Path::new("."))
        .expect("generation failed");

    match result.artifacts.first() {
        Some(artifact) if result.success => {
            println!("{} -> {}", result.status_message, artifact.path.display())
        }
        _ => eprintln!("Generation failed: {}", result.failure_reason()),
    }
}
