use emu86_core::System;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    let model = args.get(1).map(|s| s.as_str()).unwrap_or("80386");

    let Some(cpu_model) = emu86_core::CpuModel::from_name(model) else {
        eprintln!("Unknown CPU model: {}", model);
        return;
    };
    let config = emu86_pc::PcConfig {
        cpu_model,
        ..Default::default()
    };
    let mut sys = emu86_pc::PcSystem::with_config(config);
    let program = emu86_pc::demo::hello_world(0x1000, 0x0100).unwrap();
    sys.load_program(program).unwrap();
    let outcome = sys.run().unwrap();
    println!("Headless {} run: {:?}", cpu_model.name(), outcome);
    println!("Console: {}", sys.console_output());
    println!("Save-state: {}", serde_json::to_string_pretty(&sys.save_state()).unwrap());
}
