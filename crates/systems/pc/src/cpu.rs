//! PC CPU wrapper
//!
//! This module wraps the core 80x86 CPU with the DOS-style boot state a
//! program expects: code and data segments at the load segment, IP at the
//! origin and a fresh stack.

use crate::config::PcConfig;
use emu86_core::register::Register;
use emu86_core::{CpuModel, Intel80x86};
use serde::{Deserialize, Serialize};

/// Where the CPU starts after reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BootState {
    segment: u16,
    origin: u16,
    stack_segment: u16,
    stack_pointer: u16,
}

/// PC CPU wrapper
#[derive(Debug, Clone)]
pub struct PcCpu {
    cpu: Intel80x86,
    boot: BootState,
}

impl PcCpu {
    pub fn with_config(config: &PcConfig) -> Self {
        let boot = BootState {
            segment: config.load_segment,
            origin: config.origin,
            stack_segment: config.stack_segment,
            stack_pointer: config.stack_pointer,
        };
        let mut pc_cpu = Self {
            cpu: Intel80x86::with_model(config.cpu_model),
            boot,
        };
        pc_cpu.apply_boot_state();
        pc_cpu
    }

    fn apply_boot_state(&mut self) {
        let BootState {
            segment,
            origin,
            stack_segment,
            stack_pointer,
        } = self.boot;
        for reg in [Register::CS, Register::DS, Register::ES] {
            self.cpu.set_register(reg, segment as u32);
        }
        self.cpu.set_ip(origin);
        self.cpu.set_stack(stack_segment, stack_pointer);
    }

    /// Reset registers to the boot state; memory is left alone
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.apply_boot_state();
    }

    /// Point CS:IP at a program entry
    pub fn set_entry(&mut self, segment: u16, offset: u16) {
        self.cpu.set_register(Register::CS, segment as u32);
        self.cpu.set_ip(offset);
    }

    pub fn model(&self) -> CpuModel {
        self.cpu.model()
    }

    pub fn cpu(&self) -> &Intel80x86 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Intel80x86 {
        &mut self.cpu
    }

    /// Get CPU register state for debugging/save states
    pub fn get_registers(&self) -> CpuRegisters {
        let cpu = &self.cpu;
        let word = |reg| cpu.registers.word(reg);
        CpuRegisters {
            eax: cpu.get_register(Register::EAX),
            ebx: cpu.get_register(Register::EBX),
            ecx: cpu.get_register(Register::ECX),
            edx: cpu.get_register(Register::EDX),
            esi: cpu.get_register(Register::ESI),
            edi: cpu.get_register(Register::EDI),
            ebp: cpu.get_register(Register::EBP),
            esp: cpu.get_register(Register::ESP),
            cs: word(Register::CS),
            ds: word(Register::DS),
            es: word(Register::ES),
            ss: word(Register::SS),
            fs: word(Register::FS),
            gs: word(Register::GS),
            ip: cpu.ip(),
            flags: cpu.flags().bits(),
            stack_base: cpu.stack_base(),
            msw: cpu.machine_status(),
        }
    }

    /// Set CPU register state (for loading save states)
    pub fn set_registers(&mut self, regs: &CpuRegisters) {
        let cpu = &mut self.cpu;
        cpu.set_register(Register::EAX, regs.eax);
        cpu.set_register(Register::EBX, regs.ebx);
        cpu.set_register(Register::ECX, regs.ecx);
        cpu.set_register(Register::EDX, regs.edx);
        cpu.set_register(Register::ESI, regs.esi);
        cpu.set_register(Register::EDI, regs.edi);
        cpu.set_register(Register::EBP, regs.ebp);
        cpu.set_register(Register::CS, regs.cs as u32);
        cpu.set_register(Register::DS, regs.ds as u32);
        cpu.set_register(Register::ES, regs.es as u32);
        cpu.set_register(Register::FS, regs.fs as u32);
        cpu.set_register(Register::GS, regs.gs as u32);
        cpu.set_stack(regs.ss, regs.esp as u16);
        cpu.set_register(Register::ESP, regs.esp);
        cpu.set_stack_base(regs.stack_base);
        cpu.set_ip(regs.ip);
        cpu.flags_mut().set_bits(regs.flags);
        cpu.set_machine_status(regs.msw);
    }
}

/// CPU register state for debugging/save states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub ss: u16,
    pub fs: u16,
    pub gs: u16,
    pub ip: u16,
    pub flags: u16,
    #[serde(default)]
    pub stack_base: u16,
    #[serde(default)]
    pub msw: u16,
}
