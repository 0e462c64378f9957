/*!
 * Monitor Tests
 * End-to-end command handling against fixture guest memory and paths
 */

use guest_monitor::events::Publisher;
use guest_monitor::{
    Command, CommandPayload, ExecutionPath, GuestAddr, GuestMemory, ImageInfo, ImageStore,
    MemoryError, Monitor, MonitorConfig, MonitorError, PanicHandler, COMMAND_SIZE,
    COMMAND_VERSION, UNKNOWN_ID,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FixtureMemory {
    bytes: HashMap<GuestAddr, u8>,
}

impl FixtureMemory {
    fn put_u64(&mut self, addr: GuestAddr, value: u64) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.bytes.insert(addr + i as GuestAddr, *b);
        }
    }

    fn put_u32(&mut self, addr: GuestAddr, value: u32) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.bytes.insert(addr + i as GuestAddr, *b);
        }
    }

    fn put_cstring(&mut self, addr: GuestAddr, value: &str) {
        for (i, b) in value.bytes().enumerate() {
            self.bytes.insert(addr + i as GuestAddr, b);
        }
        self.bytes.insert(addr + value.len() as GuestAddr, 0);
    }
}

impl GuestMemory for FixtureMemory {
    fn read(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), MemoryError> {
        for (i, out) in buf.iter_mut().enumerate() {
            match self.bytes.get(&addr.wrapping_add(i as GuestAddr)) {
                Some(b) => *out = *b,
                None => {
                    return Err(MemoryError::ReadFailed {
                        addr,
                        len: buf.len(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Records the control actions the monitor issues against it
struct FixturePath {
    id: u64,
    address_space: u64,
    mem: FixtureMemory,
    non_switchable: bool,
    terminations: Vec<String>,
}

impl FixturePath {
    fn new(id: u64, address_space: u64) -> Self {
        Self {
            id,
            address_space,
            mem: FixtureMemory::default(),
            non_switchable: false,
            terminations: Vec::new(),
        }
    }
}

impl GuestMemory for FixturePath {
    fn read(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), MemoryError> {
        self.mem.read(addr, buf)
    }
}

impl ExecutionPath for FixturePath {
    fn id(&self) -> u64 {
        self.id
    }

    fn address_space(&self) -> u64 {
        self.address_space
    }

    fn set_non_switchable(&mut self) {
        self.non_switchable = true;
    }

    fn terminate(&mut self, reason: &str) {
        self.terminations.push(reason.to_string());
    }
}

/// Image store with nothing on disk
struct NullImages;

impl ImageStore for NullImages {
    fn lookup(&self, _name: &str, _declared_size: u64) -> Option<ImageInfo> {
        None
    }
}

/// Image store backed by a fixed name -> info table
struct FixtureImages(HashMap<String, ImageInfo>);

impl ImageStore for FixtureImages {
    fn lookup(&self, name: &str, _declared_size: u64) -> Option<ImageInfo> {
        self.0.get(name).copied()
    }
}

#[derive(Default)]
struct RecordingPanicHandler {
    calls: Mutex<Vec<(GuestAddr, u64)>>,
}

impl PanicHandler for RecordingPanicHandler {
    fn on_panic(&self, _path: &mut dyn ExecutionPath, message: GuestAddr, message_size: u64) {
        self.calls.lock().unwrap().push((message, message_size));
    }
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn monitor_with_config(config: MonitorConfig) -> Monitor {
    Monitor::new(
        config,
        Arc::new(NullImages),
        Arc::new(RecordingPanicHandler::default()),
    )
}

fn monitor() -> Monitor {
    monitor_with_config(MonitorConfig::default())
}

/// Subscribe a collecting sink to a publish point
fn collect<T>(publisher: &Publisher<T>) -> Arc<Mutex<Vec<T>>>
where
    T: Clone + Send + Sync + 'static,
{
    let sink = Arc::new(Mutex::new(Vec::new()));
    let tap = Arc::clone(&sink);
    publisher.subscribe(move |event: &T| tap.lock().unwrap().push(event.clone()));
    sink
}

fn encode(current_pid: u64, payload: CommandPayload) -> [u8; COMMAND_SIZE] {
    Command {
        current_pid,
        payload,
    }
    .encode()
}

fn init_command(
    page_offset: u64,
    current_task_address: u64,
    task_pid_offset: u64,
    task_tgid_offset: u64,
    start_kernel: u64,
) -> [u8; COMMAND_SIZE] {
    encode(
        0,
        CommandPayload::Init {
            page_offset,
            current_task_address,
            task_pid_offset,
            task_tgid_offset,
            start_kernel,
        },
    )
}

#[test]
fn test_unknown_kind_is_silently_dropped() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);

    let module_loads = collect(&monitor.events().module_load);
    let segfaults = collect(&monitor.events().segfault);

    let mut raw = [0u8; COMMAND_SIZE];
    raw[..8].copy_from_slice(&COMMAND_VERSION.to_le_bytes());
    raw[8..16].copy_from_slice(&42u64.to_le_bytes());

    assert!(monitor.handle_command(&mut path, &raw).is_ok());
    assert!(module_loads.lock().unwrap().is_empty());
    assert!(segfaults.lock().unwrap().is_empty());

    let stats = monitor.stats();
    assert_eq!(stats.unknown_commands, 1);
    assert_eq!(stats.commands_handled, 0);
    assert_eq!(stats.notifications_published, 0);
}

#[test]
fn test_transport_contract_violations_are_errors() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);

    let err = monitor.handle_command(&mut path, &[0u8; 16]).unwrap_err();
    assert!(matches!(err, MonitorError::Command(_)));

    let mut raw = [0u8; COMMAND_SIZE];
    raw[..8].copy_from_slice(&(COMMAND_VERSION + 1).to_le_bytes());
    let err = monitor.handle_command(&mut path, &raw).unwrap_err();
    assert!(matches!(err, MonitorError::Command(_)));
}

#[test]
fn test_identity_is_unknown_before_init() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);

    // Memory is fully populated; only the missing layout should matter.
    path.mem.put_u64(0x2000, 0x3000);
    path.mem.put_u64(0x2008, 42);
    path.mem.put_u32(0x3010, 7);

    assert_eq!(monitor.pid(&path), UNKNOWN_ID);
    assert_eq!(monitor.tid(&path), UNKNOWN_ID);
    assert_eq!(monitor.kernel_layout(), None);
}

#[test]
fn test_identity_after_init_end_to_end() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);

    path.mem.put_u64(0x2000, 0x3000); // current-task slot -> task struct
    path.mem.put_u64(0x2008, 42); // thread id beside the slot
    path.mem.put_u64(0x3008, 0xbad); // decoy behind the pointer
    path.mem.put_u32(0x3010, 7); // thread-group id inside the task

    let raw = init_command(0x1000, 0x2000, 8, 16, 0x1000_0000);
    monitor.handle_command(&mut path, &raw).unwrap();

    assert_eq!(monitor.tid(&path), 42);
    assert_eq!(monitor.pid(&path), 7);
    assert!(monitor.is_initialized(1));
    assert!(monitor.is_kernel_address(0x1000));
    assert!(!monitor.is_kernel_address(0xfff));
}

#[test]
fn test_segfault_marks_path_and_respects_disabled_termination() {
    let monitor = monitor_with_config(MonitorConfig::new().with_terminate_on_segfault(false));
    let mut path = FixturePath::new(1, 0xcafe);
    let segfaults = collect(&monitor.events().segfault);

    let raw = encode(
        0x1234,
        CommandPayload::Segfault {
            pc: 0x4000,
            address: 0xdead,
            fault: 14,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    let events = segfaults.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pid, 0x1234);
    assert_eq!(events[0].address_space, 0xcafe);
    assert_eq!(events[0].pc, 0x4000);
    assert_eq!(events[0].address, 0xdead);
    assert_eq!(events[0].fault, 14);

    assert!(path.non_switchable);
    assert!(path.terminations.is_empty());
}

#[test]
fn test_segfault_terminates_exactly_once_when_enabled() {
    init_logs();
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);
    let segfaults = collect(&monitor.events().segfault);

    let raw = encode(
        0x1234,
        CommandPayload::Segfault {
            pc: 0x4000,
            address: 0xdead,
            fault: 14,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    assert_eq!(segfaults.lock().unwrap().len(), 1);
    assert!(path.non_switchable);
    assert_eq!(path.terminations, vec!["segfault".to_string()]);
    assert_eq!(monitor.stats().paths_terminated, 1);
}

#[test]
fn test_trap_respects_termination_config() {
    init_logs();
    let raw = encode(
        0x1234,
        CommandPayload::Trap {
            pc: 0x4000,
            trapnr: 3,
            signr: 5,
            error_code: 0,
        },
    );

    let monitor = monitor_with_config(MonitorConfig::new().with_terminate_on_trap(false));
    let mut path = FixturePath::new(1, 0xcafe);
    let traps = collect(&monitor.events().trap);
    monitor.handle_command(&mut path, &raw).unwrap();

    assert_eq!(traps.lock().unwrap().len(), 1);
    assert_eq!(traps.lock().unwrap()[0].trapnr, 3);
    assert_eq!(traps.lock().unwrap()[0].signr, 5);
    assert!(path.non_switchable);
    assert!(path.terminations.is_empty());

    let monitor = monitor_with_config(MonitorConfig::default());
    let mut path = FixturePath::new(1, 0xcafe);
    monitor.handle_command(&mut path, &raw).unwrap();
    assert_eq!(path.terminations, vec!["trap".to_string()]);
}

#[test]
fn test_process_load_completes_initialization() {
    let monitor = monitor();
    let mut path = FixturePath::new(7, 0xcafe);
    let process_loads = collect(&monitor.events().process_load);

    path.mem.put_cstring(0x5000, "/usr/bin/cat");
    assert!(!monitor.is_initialized(7));

    let raw = encode(
        0x42,
        CommandPayload::ProcessLoad {
            process_path: 0x5000,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    assert!(monitor.is_initialized(7));
    let events = process_loads.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].file_name, "cat");
    assert_eq!(events[0].pid, 0x42);
    assert_eq!(events[0].address_space, 0xcafe);
}

#[test]
fn test_initialization_is_idempotent_across_events() {
    let monitor = monitor();
    let mut path = FixturePath::new(7, 0xcafe);
    path.mem.put_cstring(0x5000, "/sbin/init");

    let init_raw = init_command(0x1000, 0x2000, 8, 16, 0x1000_0000);
    monitor.handle_command(&mut path, &init_raw).unwrap();
    assert!(monitor.is_initialized(7));

    let load_raw = encode(
        1,
        CommandPayload::ProcessLoad {
            process_path: 0x5000,
        },
    );
    monitor.handle_command(&mut path, &load_raw).unwrap();

    // Same observable state as after the first completion.
    assert!(monitor.is_initialized(7));
}

#[test]
fn test_process_load_with_unreadable_path_continues() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);
    let process_loads = collect(&monitor.events().process_load);

    let raw = encode(
        0x42,
        CommandPayload::ProcessLoad {
            process_path: 0x5000, // unmapped
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    let events = process_loads.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].file_name, "");
    assert_eq!(monitor.stats().warnings, 1);
}

#[test]
fn test_module_load_with_unreadable_path_is_aborted() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);
    let module_loads = collect(&monitor.events().module_load);

    let raw = encode(
        0x42,
        CommandPayload::ModuleLoad {
            module_path: 0x5000, // unmapped
            load_base: 0x7000,
            size: 4096,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    assert!(module_loads.lock().unwrap().is_empty());
    assert_eq!(monitor.stats().warnings, 1);
    assert_eq!(monitor.stats().notifications_published, 0);
}

#[test]
fn test_module_load_without_image_keeps_guest_fields() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);
    let module_loads = collect(&monitor.events().module_load);

    path.mem.put_cstring(0x5000, "/lib/libc.so");
    let raw = encode(
        0x42,
        CommandPayload::ModuleLoad {
            module_path: 0x5000,
            load_base: 0x7000,
            size: 4096,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    let events = module_loads.lock().unwrap();
    assert_eq!(events.len(), 1);
    let module = &events[0].module;
    assert_eq!(module.path, "/lib/libc.so");
    assert_eq!(module.name, "libc.so");
    assert_eq!(module.size, 4096);
    assert_eq!(module.entry_point, 0);
    assert_eq!(module.load_base, 0x7000);
    assert_eq!(module.address_space, 0xcafe);
    assert_eq!(module.pid, 0x42);
}

#[test]
fn test_module_load_enriched_from_image_store() {
    let mut images = HashMap::new();
    images.insert(
        "libc.so".to_string(),
        ImageInfo {
            size: 123_456,
            entry_point: 0x1111,
        },
    );
    let monitor = Monitor::new(
        MonitorConfig::default(),
        Arc::new(FixtureImages(images)),
        Arc::new(RecordingPanicHandler::default()),
    );
    let mut path = FixturePath::new(1, 0xcafe);
    let module_loads = collect(&monitor.events().module_load);

    path.mem.put_cstring(0x5000, "/lib/libc.so");
    let raw = encode(
        0x42,
        CommandPayload::ModuleLoad {
            module_path: 0x5000,
            load_base: 0x7000,
            size: 4096,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    let events = module_loads.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].module.size, 123_456);
    assert_eq!(events[0].module.entry_point, 0x1111);
    assert_eq!(monitor.stats().warnings, 0);
}

#[test]
fn test_init_publishes_kernel_image() {
    let mut images = HashMap::new();
    images.insert(
        "vmlinux".to_string(),
        ImageInfo {
            size: 0x80_0000,
            entry_point: 0x2222,
        },
    );
    let monitor = Monitor::new(
        MonitorConfig::default(),
        Arc::new(FixtureImages(images)),
        Arc::new(RecordingPanicHandler::default()),
    );
    let mut path = FixturePath::new(1, 0xcafe);
    let module_loads = collect(&monitor.events().module_load);

    let raw = init_command(0xffff_8000_0000_0000, 0x2000, 8, 16, 0xffff_8000_0100_0000);
    monitor.handle_command(&mut path, &raw).unwrap();

    let events = module_loads.lock().unwrap();
    assert_eq!(events.len(), 1);
    let module = &events[0].module;
    assert_eq!(module.name, "vmlinux");
    assert_eq!(module.load_base, 0xffff_8000_0000_0000);
    // The guest-reported entry stays authoritative.
    assert_eq!(module.entry_point, 0xffff_8000_0100_0000);
    assert_eq!(module.size, 0x80_0000);
}

#[test]
fn test_second_init_overwrites_layout() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);

    monitor
        .handle_command(&mut path, &init_command(0x1000, 0x2000, 8, 16, 0))
        .unwrap();
    monitor
        .handle_command(&mut path, &init_command(0x1000, 0x8000, 8, 16, 0))
        .unwrap();

    let layout = monitor.kernel_layout().unwrap();
    assert_eq!(layout.current_task_addr, 0x8000);
}

#[test]
fn test_process_exit_notification() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);
    let exits = collect(&monitor.events().process_exit);

    let raw = encode(0x42, CommandPayload::ProcessExit { code: 9 });
    monitor.handle_command(&mut path, &raw).unwrap();

    let events = exits.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pid, 0x42);
    assert_eq!(events[0].address_space, 0xcafe);
    assert_eq!(events[0].exit_code, 9);
}

#[test]
fn test_memory_region_notifications() {
    let monitor = monitor();
    let mut path = FixturePath::new(1, 0xcafe);
    let maps = collect(&monitor.events().memory_map);
    let unmaps = collect(&monitor.events().memory_unmap);
    let protects = collect(&monitor.events().memory_protect);

    monitor
        .handle_command(
            &mut path,
            &encode(
                0x42,
                CommandPayload::MemoryMap {
                    address: 0x7000,
                    size: 0x2000,
                    prot: 0b101,
                    flags: 0x22,
                    pgoff: 0,
                },
            ),
        )
        .unwrap();
    monitor
        .handle_command(
            &mut path,
            &encode(
                0x42,
                CommandPayload::MemoryUnmap {
                    start: 0x7000,
                    end: 0x9000,
                },
            ),
        )
        .unwrap();
    monitor
        .handle_command(
            &mut path,
            &encode(
                0x42,
                CommandPayload::MemoryProtect {
                    start: 0x7000,
                    size: 0x1000,
                    prot: 0b001,
                },
            ),
        )
        .unwrap();

    let maps = maps.lock().unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].address, 0x7000);
    assert_eq!(maps[0].size, 0x2000);
    assert_eq!(maps[0].prot, 0b101);

    let unmaps = unmaps.lock().unwrap();
    assert_eq!(unmaps.len(), 1);
    assert_eq!(unmaps[0].start, 0x7000);
    // Size is derived from the wire's start/end pair.
    assert_eq!(unmaps[0].size, 0x2000);

    let protects = protects.lock().unwrap();
    assert_eq!(protects.len(), 1);
    assert_eq!(protects[0].prot, 0b001);
}

#[test]
fn test_kernel_panic_delegates_to_handler() {
    let panic_handler = Arc::new(RecordingPanicHandler::default());
    let monitor = Monitor::new(
        MonitorConfig::default(),
        Arc::new(NullImages),
        Arc::clone(&panic_handler) as Arc<dyn PanicHandler>,
    );
    let mut path = FixturePath::new(1, 0xcafe);

    let raw = encode(
        0,
        CommandPayload::KernelPanic {
            message: 0x6000,
            message_size: 64,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();

    assert_eq!(*panic_handler.calls.lock().unwrap(), vec![(0x6000, 64)]);
}

#[test]
fn test_forget_path_clears_initialization() {
    let monitor = monitor();
    let mut path = FixturePath::new(9, 0xcafe);
    path.mem.put_cstring(0x5000, "/bin/sh");

    let raw = encode(
        1,
        CommandPayload::ProcessLoad {
            process_path: 0x5000,
        },
    );
    monitor.handle_command(&mut path, &raw).unwrap();
    assert!(monitor.is_initialized(9));

    monitor.forget_path(9);
    assert!(!monitor.is_initialized(9));
}
