#![no_main]

use juno_core::{
    disassemble, CoreConfig, Decoder, FlatMemory, HandlerRegistry, JunoCore, ProgramImage,
    RandInstructionHandler, RunBoundary,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let _ = Decoder::decode(word);
    let _ = disassemble(word);
    let _ = ProgramImage::parse(data);

    let split = usize::from(data[4]) % data.len();
    let (literals, code) = data[5..].split_at(split.min(data.len() - 5));
    let words: Vec<u32> = code
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let Ok(image) = ProgramImage::from_parts(literals, &words) else {
        return;
    };

    let mut memory = FlatMemory::with_image(&image, 256, u64::from(data[5] % 4));
    let config = CoreConfig {
        max_address: 4096,
        ..CoreConfig::default()
    };
    let handlers = HandlerRegistry::new().with(Box::new(RandInstructionHandler::default()));
    let mut core = JunoCore::new(image, config, handlers);
    let _ = juno_core::run_until(&mut core, &mut memory, RunBoundary::Halted, 10_000);
});
