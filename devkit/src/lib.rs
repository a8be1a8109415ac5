/*!
# Governor DevKit - stubs de test pour le hook de gouverneur CPU

Permet de tester le hook sans cluster Proxmox ni accès root:
- Arbre sysfs factice (`cpuN/cpufreq/scaling_governor`) dans un dossier temporaire
- Faux serveur API Proxmox (ticket, nodes, qemu, config) qui journalise les requêtes
*/

pub mod cpu_tree;
pub mod proxmox_stub;

pub use cpu_tree::FakeCpuTree;
pub use proxmox_stub::{MockProxmoxServer, RawResponse, StubNode, StubVm};
