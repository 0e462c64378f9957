/*!
 * Event Handlers
 * One handler per command kind: turn wire records into notifications,
 * update tracked state, and issue path control actions
 */

use super::{Monitor, KERNEL_IMAGE_NAME};
use crate::core::traits::ExecutionPath;
use crate::core::types::{GuestAddr, Pid, Prot};
use crate::events::types::{
    short_name, MemoryMapEvent, MemoryProtectEvent, MemoryUnmapEvent, ModuleDescriptor,
    ModuleLoadEvent, ProcessExitEvent, ProcessLoadEvent, SegfaultEvent, TrapEvent,
};
use crate::tracking::KernelLayout;
use log::{debug, warn};

impl Monitor {
    pub(super) fn handle_segfault(
        &self,
        path: &mut dyn ExecutionPath,
        pid: Pid,
        pc: GuestAddr,
        address: GuestAddr,
        fault: u64,
    ) {
        warn!(
            "received segfault type={fault:#x} pagedir={:#x} pid={pid:#x} pc={pc:#x} addr={address:#x}",
            path.address_space()
        );

        // The scheduler stays pinned to this path until it is torn down.
        debug!("blocking path switching until path {} is terminated", path.id());
        path.set_non_switchable();

        self.events.segfault.publish(&SegfaultEvent {
            pid,
            address_space: path.address_space(),
            pc,
            address,
            fault,
        });
        self.stats.inc_published();

        if self.config.terminate_on_segfault {
            debug!("terminating path {}: received segfault", path.id());
            self.stats.inc_terminated();
            path.terminate("segfault");
        }
    }

    pub(super) fn handle_process_load(
        &self,
        path: &mut dyn ExecutionPath,
        pid: Pid,
        process_path: GuestAddr,
    ) {
        self.init.complete(path.id());

        let loaded_path = match path.read_cstring(process_path) {
            Ok(loaded_path) => loaded_path,
            Err(err) => {
                warn!("could not read process path of pid {pid:#x}: {err}");
                self.stats.inc_warnings();
                String::new()
            }
        };

        debug!("process {loaded_path} loaded pid={pid:#x}");

        self.events.process_load.publish(&ProcessLoadEvent {
            address_space: path.address_space(),
            pid,
            file_name: short_name(&loaded_path),
        });
        self.stats.inc_published();
    }

    pub(super) fn handle_module_load(
        &self,
        path: &mut dyn ExecutionPath,
        pid: Pid,
        module_path: GuestAddr,
        load_base: GuestAddr,
        size: u64,
    ) {
        let loaded_path = match path.read_cstring(module_path) {
            Ok(loaded_path) => loaded_path,
            Err(err) => {
                warn!("could not read module path: {err}");
                self.stats.inc_warnings();
                return;
            }
        };

        let mut module =
            ModuleDescriptor::new(loaded_path, size, load_base, path.address_space(), pid);

        match self.images.lookup(&module.name, module.size) {
            Some(info) => {
                module.size = info.size;
                module.entry_point = info.entry_point;
            }
            None => {
                warn!(
                    "could not load {} from disk; keeping guest-declared metadata",
                    module.path
                );
                self.stats.inc_warnings();
            }
        }

        debug!("module loaded: {module:?}");

        self.events.module_load.publish(&ModuleLoadEvent { module });
        self.stats.inc_published();
    }

    pub(super) fn handle_trap(
        &self,
        path: &mut dyn ExecutionPath,
        pid: Pid,
        pc: GuestAddr,
        trapnr: u64,
        signr: u64,
        error_code: u64,
    ) {
        warn!(
            "received trap pid={pid:#x} pc={pc:#x} trapnr={trapnr:#x} signr={signr:#x} err_code={error_code}"
        );

        debug!("blocking path switching until path {} is terminated", path.id());
        path.set_non_switchable();

        self.events.trap.publish(&TrapEvent {
            pid,
            pc,
            trapnr,
            signr,
        });
        self.stats.inc_published();

        if self.config.terminate_on_trap {
            debug!("terminating path {}: received trap", path.id());
            self.stats.inc_terminated();
            path.terminate("trap");
        }
    }

    pub(super) fn handle_process_exit(&self, path: &mut dyn ExecutionPath, pid: Pid, code: u64) {
        let address_space = path.address_space();
        debug!("removing task pid={pid:#x} address_space={address_space:#x} exit_code={code}");

        self.events.process_exit.publish(&ProcessExitEvent {
            address_space,
            pid,
            exit_code: code,
        });
        self.stats.inc_published();
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn handle_init(
        &self,
        path: &mut dyn ExecutionPath,
        pid: Pid,
        page_offset: GuestAddr,
        current_task_address: GuestAddr,
        task_pid_offset: u64,
        task_tgid_offset: u64,
        start_kernel: GuestAddr,
    ) {
        debug!(
            "received kernel init page_offset={page_offset:#x} &current_task={current_task_address:#x} \
             pid offset={task_pid_offset} tgid offset={task_tgid_offset}"
        );

        self.kernel.set_layout(KernelLayout {
            kernel_base: page_offset,
            current_task_addr: current_task_address,
            task_pid_offset,
            task_tgid_offset,
        });

        self.init.complete(path.id());

        self.load_kernel_image(path, pid, page_offset, start_kernel);
    }

    /// Publish the guest kernel's own image as a synthetic module
    ///
    /// There is no path to read from guest memory at this point; the
    /// image is identified by its well-known name and the entry address
    /// the guest supplied.
    fn load_kernel_image(
        &self,
        path: &mut dyn ExecutionPath,
        pid: Pid,
        page_offset: GuestAddr,
        start_kernel: GuestAddr,
    ) {
        let mut module = ModuleDescriptor::new(
            KERNEL_IMAGE_NAME.to_string(),
            0,
            page_offset,
            path.address_space(),
            pid,
        );
        module.entry_point = start_kernel;

        match self.images.lookup(KERNEL_IMAGE_NAME, 0) {
            Some(info) => module.size = info.size,
            None => {
                warn!("could not load {KERNEL_IMAGE_NAME} from disk; keeping guest-declared metadata");
                self.stats.inc_warnings();
            }
        }

        debug!("kernel image loaded: {module:?}");

        self.events.module_load.publish(&ModuleLoadEvent { module });
        self.stats.inc_published();
    }

    pub(super) fn handle_kernel_panic(
        &self,
        path: &mut dyn ExecutionPath,
        message: GuestAddr,
        message_size: u64,
    ) {
        debug!("kernel panic reported, message at {message:#x} ({message_size} bytes)");
        self.panic.on_panic(path, message, message_size);
    }

    pub(super) fn handle_memory_map(
        &self,
        pid: Pid,
        address: GuestAddr,
        size: u64,
        prot: Prot,
        flags: u64,
        pgoff: u64,
    ) {
        debug!(
            "mmap pid={pid:#x} addr={address:#x} size={size:#x} prot={prot:#x} flag={flags:#x} pgoff={pgoff:#x}"
        );

        self.events.memory_map.publish(&MemoryMapEvent {
            pid,
            address,
            size,
            prot,
        });
        self.stats.inc_published();
    }

    pub(super) fn handle_memory_unmap(&self, pid: Pid, start: GuestAddr, end: GuestAddr) {
        debug!("munmap pid={pid:#x} start={start:#x} end={end:#x}");

        let size = end.wrapping_sub(start);
        self.events.memory_unmap.publish(&MemoryUnmapEvent {
            pid,
            start,
            size,
        });
        self.stats.inc_published();
    }

    pub(super) fn handle_memory_protect(&self, pid: Pid, start: GuestAddr, size: u64, prot: Prot) {
        debug!("mprotect pid={pid:#x} start={start:#x} size={size:#x} prot={prot:#x}");

        self.events.memory_protect.publish(&MemoryProtectEvent {
            pid,
            start,
            size,
            prot,
        });
        self.stats.inc_published();
    }
}
